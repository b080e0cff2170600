//! Best-effort normalization of model output into a renderable partition.
//!
//! The generator's output grammar is not contractually fixed, so everything
//! here is explicit heuristic matching with a documented fallback order. No
//! step ever fails: when extraction finds nothing, the previous partition
//! value is kept rather than emitting empty output. Stale-but-rendering beats
//! a blank preview.
//!
//! Two stages share this module. `finalize` runs on the producing side and
//! guarantees the streamed code ends as a callable `App` component;
//! `normalize` runs per turn on the accumulated result and splits it into
//! HTML, CSS, and JS partitions.

use std::sync::LazyLock;

use regex::Regex;

use crate::codegen::CodePartition;

static FENCES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```jsx|```js|```javascript|```|jsx").unwrap());

static ENTRY_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)function\s+App\s*\(|const\s+App\s*=|class\s+App\s+extends|var\s+App\s*=|let\s+App\s*=|export\s+(default\s+)?(function\s+App|class\s+App|const\s+App\s*=)",
    )
    .unwrap()
});

static RETURN_JSX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)return\s*\(\s*(<.*>.*</.*>)\s*\);").unwrap());

static DIV_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<div[^>]*>.*?</div>").unwrap());

static ANY_TAG_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[a-zA-Z][^>]*>.*?</[a-zA-Z][^>]*>").unwrap());

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<style[^>]*>(.*?)</style>").unwrap());

static STYLES_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"const\s+styles\s*=\s*\{([^}]*)\}").unwrap());

static ANY_JSX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<.*>.*</.*>").unwrap());

static APP_FN_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"function App\(\)\s*\{").unwrap());

// Ordered (pattern, replacement) pairs for stripping module syntax the
// sandbox's script runtime cannot evaluate.
static MODULE_SYNTAX: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"export\s+default\s+App\s*;?").unwrap(), ""),
        (Regex::new(r"export\s+default\s+function\s+App").unwrap(), "function App"),
        (Regex::new(r"export\s+function\s+App").unwrap(), "function App"),
        (Regex::new(r"export\s+const\s+App\s*=").unwrap(), "const App ="),
        (Regex::new(r"export\s+default\s+class\s+App").unwrap(), "class App"),
        (Regex::new(r"export\s+class\s+App").unwrap(), "class App"),
        (Regex::new(r"export\s+default\s+").unwrap(), ""),
        (Regex::new(r"export\s+").unwrap(), ""),
        (
            Regex::new(r#"import\s+React\s*,?\s*\{\s*[^}]*\s*\}\s*from\s+['"]react['"];?"#).unwrap(),
            "/* React import removed */",
        ),
        (
            Regex::new(r#"import\s+React\s+from\s+['"]react['"];?"#).unwrap(),
            "/* React import removed */",
        ),
        (
            Regex::new(r#"import\s+\{\s*[^}]*\s*\}\s*from\s+['"]react['"];?"#).unwrap(),
            "/* React import removed */",
        ),
        (Regex::new(r"import\s+[^;]+;?").unwrap(), "/* import removed */"),
    ]
});

/// Remove markdown fence artifacts. Applying this twice is a no-op.
pub fn strip_fences(code: &str) -> String {
    FENCES.replace_all(code, "").trim().to_string()
}

/// Whether the text declares a top-level `App` entry point in any of the
/// forms the generator is known to emit.
pub fn has_entry_point(code: &str) -> bool {
    ENTRY_POINT.is_match(code)
}

fn escape_angle_brackets(code: &str) -> String {
    code.replace('<', "&lt;").replace('>', "&gt;")
}

/// Producer-side finalization of accumulated model output.
///
/// Guarantees the result is a callable `App` component: loose JSX is wrapped,
/// non-JSX text is escaped into a readable fallback, a trailing default
/// export is appended, and bare hook calls get a `React` destructuring so the
/// code runs without a module loader.
pub fn finalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut code = if trimmed.starts_with("function App()")
        || trimmed.starts_with("function App ")
        || trimmed.starts_with("const App")
    {
        raw.to_string()
    } else if let Some(jsx) = ANY_JSX.find(raw) {
        format!(
            "function App() {{\n  return (\n    {}\n  );\n}}",
            jsx.as_str()
        )
    } else {
        format!(
            "function App() {{\n  return (\n    <div className=\"vads-l-grid-container\">\n      <h2>Generated Component</h2>\n      <pre>{}</pre>\n    </div>\n  );\n}}",
            escape_angle_brackets(raw)
        )
    };

    if !code.contains("export default App") {
        code.push_str("\n\nexport default App;");
    }

    let uses_hooks =
        code.contains("useState") || code.contains("useEffect") || code.contains("useRef");
    if uses_hooks && !code.contains("React.useState") && !code.contains("import React") {
        code = APP_FN_OPEN
            .replace(
                &code,
                "function App() {\n  const { useState, useEffect, useRef } = React;",
            )
            .into_owned();
    }

    code
}

fn wrap_in_app(body: &str) -> String {
    // Loose statements carrying their own return become the function body;
    // everything else is returned inside the grid container.
    if body.contains("return") {
        format!(
            "function App() {{\n  const {{ useState, useEffect, useRef, useCallback, useMemo }} = React;\n\n  {}\n}}",
            body
        )
    } else {
        format!(
            "function App() {{\n  const {{ useState, useEffect, useRef, useCallback, useMemo }} = React;\n\n  return (\n    <div className=\"vads-l-grid-container\">\n      {}\n    </div>\n  );\n}}",
            body
        )
    }
}

fn neutralize_module_syntax(code: &str) -> String {
    let mut out = code.to_string();
    for (pattern, replacement) in MODULE_SYNTAX.iter() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}

/// Split normalized source into HTML, CSS, and JS partitions.
///
/// Fallback order per partition:
/// - HTML: parenthesized JSX return block; then (only when the original text
///   had no entry point) the first div block or any balanced tag pair; else
///   keep the previous HTML.
/// - CSS: embedded `<style>` block content; then a rule synthesized from a
///   `const styles = {...}` object; else keep the previous CSS.
/// - JS: the full source with import/export syntax neutralized, wrapped in a
///   synthesized `App` when no entry point was present.
pub fn normalize(raw: &str, previous: &CodePartition) -> CodePartition {
    let cleaned = strip_fences(raw);
    if cleaned.is_empty() {
        return previous.clone();
    }

    let had_entry_point = has_entry_point(&cleaned);
    let code = if had_entry_point {
        cleaned
    } else {
        wrap_in_app(&cleaned)
    };

    let html = if let Some(caps) = RETURN_JSX.captures(&code) {
        caps[1].to_string()
    } else if !had_entry_point {
        // Loose output: scavenge any markup before giving up.
        if let Some(m) = DIV_BLOCK.find(&code) {
            m.as_str().to_string()
        } else if let Some(m) = ANY_TAG_PAIR.find(&code) {
            m.as_str().to_string()
        } else {
            previous.html.clone()
        }
    } else {
        previous.html.clone()
    };

    let css = if let Some(caps) = STYLE_BLOCK.captures(&code) {
        caps[1].to_string()
    } else if let Some(caps) = STYLES_OBJECT.captures(&code) {
        format!("/* Styles extracted from JS */\n.component {{\n{}\n}}", &caps[1])
    } else {
        previous.css.clone()
    };

    let js = neutralize_module_syntax(&code);

    CodePartition { html, css, js }
}
