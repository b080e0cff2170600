//! Prompt assembly for the component generation model.
//!
//! The system prompt is fixed text that pins down the output contract (a bare
//! `function App()` with no markdown fences); the user prompt layers the
//! caller's request with optional component hints, prior code, and prior
//! conversation turns, in that order.

use crate::generate::GenerationRequest;

/// Base system prompt sent with every generation request.
pub const SYSTEM_PROMPT: &str = r#"You are an expert React developer specializing in creating VA (Veterans Affairs) components.
Create a complete, functional React component based on the user's request.
The component should follow VA Design System guidelines and be accessible.

IMPORTANT - CREATE COMPLETE MOCK VA PAGES, NOT ISOLATED COMPONENTS:
Always create a fully realized mock VA page that includes:
1. Proper page context, headers, and navigation elements
2. Realistic page layout with appropriate surrounding content
3. Multiple related components that would appear on a real VA page
4. Appropriate page title, breadcrumbs, and page navigation
5. Mock data and state that simulates a real application
6. Error states, loading states, and success states

VA WEB COMPONENTS USAGE:
Use VA Web Components with their proper syntax, for example:

<va-alert status="info" visible>
  <h2 slot="headline">Information Alert</h2>
  <p>This is an informational message.</p>
</va-alert>

<va-text-input
  label="First name"
  name="firstName"
  value={formData.firstName}
  onInput={(e) => handleChange(e)}
  required
/>

<va-button
  text="Edit"
  onClick={(event) => console.log(event.detail)}
/>

<va-accordion>
  <va-accordion-item header="Question 1">
    Answer to question 1.
  </va-accordion-item>
</va-accordion>

IMPORTANT GUIDELINES FOR CONSISTENT OUTPUT:
1. Always use proper multiline formatting for VA components with props on separate lines
2. Use className for React CSS classes, not class
3. Use {' '} for spaces within JSX when needed
4. Always wrap your component in a "vads-l-grid-container" div
5. Use VA Design System utility classes (vads-u-*) for styling
6. Include proper ARIA attributes for accessibility
7. Use VA components wherever possible instead of HTML equivalents
8. For event handling with VA components, use proper event syntax, e.g., onClick={(e) => handleClick(e)}
9. DO NOT include any markdown code blocks or code ticks (```) in your response

PAGE STRUCTURE REQUIREMENTS:
1. Include a proper page header with title, navigation, and breadcrumbs
2. Add contextual information to explain the purpose of the page
3. Use proper VA layout structure with appropriate grid containers and columns
4. Add realistic mock data that represents what users would see
5. Include all success, error, and loading states
6. Add a help section at the bottom of the page
7. Create mock backend interactions (simulate API calls with setTimeout)

IMPORTANT: Your response must use this EXACT format, WITHOUT ANY MARKDOWN CODE BLOCKS OR TICKS:

function App() {
  // generated logic here (state, handlers, etc.)

  return (
    <div className="vads-l-grid-container">
      // generated UI code here with properly formatted VA Web Components
    </div>
  );
}

DO NOT include ReactDOM.render, imports, or markdown code blocks. Just provide the clean App component code.
Use functional components with hooks, and follow best practices."#;

const FOLLOW_UP_ADDENDUM: &str = r#"

IMPORTANT - THIS IS A FOLLOW-UP REQUEST:
You previously generated code for this user. They are now asking you to make changes to the existing code.
DO NOT regenerate the entire component from scratch. Instead, make targeted modifications to the previous code.
Keep the existing structure and only change what's necessary to fulfill the new request.
Ensure all changes maintain the same style, naming conventions, and approach as the original code."#;

/// The system/user instruction pair for one upstream call.
#[derive(Debug, Clone)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Build both prompts from a validated request.
pub fn build(request: &GenerationRequest) -> PromptPair {
    PromptPair {
        system: system_prompt(request),
        user: user_prompt(request),
    }
}

/// The fixed system prompt, with the in-place-modification addendum appended
/// on follow-up turns that carry previous code.
pub fn system_prompt(request: &GenerationRequest) -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();
    if request.is_follow_up && request.previous_code.is_some() {
        prompt.push_str(FOLLOW_UP_ADDENDUM);
    }
    prompt
}

/// The user prompt: raw request, then component hints, then previous code,
/// then prior prompts, then the current partition dump.
pub fn user_prompt(request: &GenerationRequest) -> String {
    let mut prompt = request.prompt.clone();

    if !request.components.is_empty() {
        prompt.push_str("\n\nUse the following VA components in the implementation: ");
        prompt.push_str(&request.components.join(", "));
    }

    if request.is_follow_up {
        if let Some(code) = &request.previous_code {
            prompt.push_str("\n\nHere is the previous code I'd like you to modify:\n\n");
            prompt.push_str(code);
            prompt.push_str("\n\nPlease make the requested changes to this existing code.");
        }
    }

    if !request.previous_prompts.is_empty() {
        prompt.push_str("\n\nFor context, here are my previous requests:\n");
        let mut first = true;
        for p in &request.previous_prompts {
            if !first {
                prompt.push('\n');
            }
            prompt.push_str("- ");
            prompt.push_str(p);
            first = false;
        }
    }

    if let Some(partition) = &request.current_code {
        if !partition.is_placeholder() {
            prompt.push_str("\n\nCurrently, the component has these parts:");
            if !partition.html.is_empty() {
                prompt.push_str("\n\nHTML:\n");
                prompt.push_str(&partition.html);
            }
            if !partition.css.is_empty() {
                prompt.push_str("\n\nCSS:\n");
                prompt.push_str(&partition.css);
            }
            if !partition.js.is_empty() {
                prompt.push_str("\n\nJavaScript:\n");
                prompt.push_str(&partition.js);
            }
        }
    }

    prompt
}
