//! Conversation state: chat transcript, per-turn lifecycle, and the
//! accumulated generation context for follow-up turns.

pub mod coordinator;

pub use coordinator::Coordinator;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codegen::CodePartition;

/// Greeting shown when a session is created.
pub const INITIAL_MESSAGE: &str = "Hi, how can I help you?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle marker on an assistant message.
///
/// `Loading` and `Streaming` messages are transient: exactly one exists while
/// a turn is in flight, and the terminal transition replaces it with a single
/// `Success` or `Error` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Plain,
    Loading,
    Streaming,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub status: MessageStatus,
    /// Generated source attached to a success message. Kept out of the
    /// visible transcript; the partition and preview render it instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            status: MessageStatus::Plain,
            generated_code: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            status: MessageStatus::Plain,
            generated_code: None,
        }
    }

    pub fn loading(content: impl Into<String>) -> Self {
        Self {
            status: MessageStatus::Loading,
            ..Self::assistant(content)
        }
    }

    pub fn streaming(content: impl Into<String>) -> Self {
        Self {
            status: MessageStatus::Streaming,
            ..Self::assistant(content)
        }
    }

    pub fn success(content: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status: MessageStatus::Success,
            generated_code: Some(code.into()),
            ..Self::assistant(content)
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            status: MessageStatus::Error,
            ..Self::assistant(content)
        }
    }

    /// Transient messages that a terminal transition replaces.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, MessageStatus::Loading | MessageStatus::Streaming)
    }
}

/// One completed generation, kept for context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub prompt: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only generation context accumulated across turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub last_generated_code: Option<String>,
    pub history: Vec<ComponentRecord>,
}

/// Per-turn state machine. `Succeeded` and `Failed` are resting states that
/// accept the next submission, so the observable terminal outcome survives
/// until a new turn begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Submitting,
    Streaming,
    Succeeded,
    Failed,
}

#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub context: ConversationContext,
    pub partition: CodePartition,
    pub selected_components: Vec<String>,
    pub turn: TurnState,
    pub inflight: usize,
    /// Prompt of the turn currently in flight, recorded into history on
    /// completion.
    pub pending_prompt: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            messages: vec![ChatMessage::assistant(INITIAL_MESSAGE)],
            context: ConversationContext::default(),
            partition: CodePartition::default(),
            selected_components: Vec::new(),
            turn: TurnState::Idle,
            inflight: 0,
            pending_prompt: None,
        }
    }

    pub fn user_prompts(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

const ACKNOWLEDGE_INITIAL: &[&str] = &[
    "I'll work on that for you right away...",
    "Sure, I'm creating that component now...",
    "I understand, building your VA component now...",
    "Got it! Working on your request...",
    "I'll help you with that. Creating your component...",
];

const ACKNOWLEDGE_FOLLOW_UP: &[&str] = &[
    "I'll handle that modification for you...",
    "Sure, I'll update the component...",
    "Got it, making those changes now...",
    "I understand, updating your component...",
    "I'll apply those changes for you...",
];

const SUCCESS_FOLLOW_UP: &[&str] = &[
    "I've updated your component! Take a look at the changes.",
    "Your component has been modified as requested. Let me know what you think!",
    "All changes applied! Check out the preview to see how it looks.",
    "Done! I've made those changes to your component.",
    "The component has been updated. Let me know if you need any more adjustments!",
];

fn pick(phrases: &[&str]) -> String {
    phrases
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(phrases[0])
        .to_string()
}

/// Acknowledgment shown while a turn is in flight.
pub fn acknowledge_phrase(is_follow_up: bool) -> String {
    if is_follow_up {
        pick(ACKNOWLEDGE_FOLLOW_UP)
    } else {
        pick(ACKNOWLEDGE_INITIAL)
    }
}

/// Success message for a finished turn. Initial turns fold the model's
/// explanation into the phrasing; follow-up turns use the fixed rotation.
pub fn success_phrase(is_follow_up: bool, explanation: &str) -> String {
    if is_follow_up {
        return pick(SUCCESS_FOLLOW_UP);
    }
    let explanation = if explanation.is_empty() {
        "Take a look at the preview."
    } else {
        explanation
    };
    let lead_ins = [
        "I've created that component for you!",
        "Your component is ready!",
        "All done!",
        "Finished creating your component.",
        "Here's the component you requested.",
    ];
    format!("{} {}", pick(&lead_ins), explanation)
}
