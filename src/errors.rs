//! Typed error hierarchy for the atelier service.
//!
//! Two top-level enums cover the two subsystems:
//! - `GenerationError`: prompt validation and model-stream failures
//! - `ImportError`: Figma, PDF, and vector-store import failures
//!
//! Every boundary converts into one of these before the failure crosses
//! into HTTP or chat state; raw errors never reach the transcript.

use thiserror::Error;

/// Errors from the code-generation pipeline.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Model API key not configured")]
    MissingApiKey,

    #[error("Field '{field}' is required")]
    MissingField { field: &'static str },

    #[error("A follow-up request requires the previous code")]
    FollowUpWithoutCode,

    #[error("Request timed out. The model took too long to respond.")]
    Timeout,

    #[error("Generation endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },

    #[error("Upstream model error: {0}")]
    Upstream(String),

    #[error("Stream ended without a terminal event")]
    MissingTerminal,

    #[error("Another generation is already in flight for this session")]
    TurnInFlight,

    #[error("Session '{id}' not found")]
    SessionNotFound { id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenerationError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GenerationError::MissingField { .. } | GenerationError::FollowUpWithoutCode
        )
    }
}

/// Errors from the auxiliary import paths.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Figma personal access token is required")]
    MissingFigmaToken,

    #[error("Figma file URL is required")]
    MissingFigmaUrl,

    #[error("Invalid Figma URL: {url}")]
    InvalidFigmaUrl { url: String },

    #[error("PDF content is required")]
    MissingPdf,

    #[error("PDF content is not valid base64: {0}")]
    InvalidPdfEncoding(#[source] base64::DecodeError),

    #[error("Model API key not configured")]
    MissingApiKey,

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ImportError::MissingFigmaToken
                | ImportError::MissingFigmaUrl
                | ImportError::InvalidFigmaUrl { .. }
                | ImportError::MissingPdf
                | ImportError::InvalidPdfEncoding(_)
        )
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Upstream(err.to_string())
        }
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        ImportError::Upstream(err.to_string())
    }
}
