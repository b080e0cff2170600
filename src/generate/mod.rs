//! Component generation: request/event types, the upstream model call, and
//! the streaming client used by consumers of the HTTP API.

pub mod client;
pub mod upstream;

pub use client::GenerationClient;

use serde::{Deserialize, Serialize};

use crate::codegen::CodePartition;
use crate::errors::GenerationError;

/// A single generation turn as submitted by a caller.
///
/// First turns carry only a prompt plus optional component hints; follow-up
/// turns must also carry the code produced by the previous turn so the model
/// modifies it in place instead of regenerating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Absent and blank prompts are both rejected by `validate`, never by
    /// deserialization, so the API answers 400 rather than 422.
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub is_follow_up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_code: Option<String>,
    #[serde(default)]
    pub previous_prompts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_code: Option<CodePartition>,
}

impl GenerationRequest {
    pub fn initial(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn follow_up(prompt: impl Into<String>, previous_code: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            is_follow_up: true,
            previous_code: Some(previous_code.into()),
            ..Default::default()
        }
    }

    /// Reject requests that cannot be sent upstream.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::MissingField { field: "prompt" });
        }
        if self.is_follow_up
            && self
                .previous_code
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(GenerationError::FollowUpWithoutCode);
        }
        Ok(())
    }
}

/// Normalized lifecycle event for one generation turn.
///
/// Every turn begins with `Started` and ends with exactly one of `Completed`
/// or `Failed`; any number of `Progress` events may appear in between.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Started,
    Progress { text: String, fraction: f32 },
    Completed { code: String, explanation: String },
    Failed { message: String },
}

impl GenerationEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
