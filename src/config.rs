//! Runtime configuration, read from the process environment.
//!
//! The model API key is the only secret. Its absence is fatal to the
//! individual request (HTTP 500 with a configuration error), never to the
//! process, so `from_env` does not validate it.

use std::time::Duration;

use crate::errors::GenerationError;

/// Default upstream model endpoint base.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default model used for generation and PDF extraction.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Client-side abort timeout for a full generation stream.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Model API key; `None` means every generation request fails with a
    /// configuration error.
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    /// How many generation turns a single session may have in flight.
    /// Single-flight is product policy, not an architectural limit.
    pub max_inflight_per_session: usize,
    /// Abort timeout for a full generation stream.
    pub generation_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let api_base =
            std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let model = std::env::var("ATELIER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_inflight_per_session = std::env::var("ATELIER_MAX_INFLIGHT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let generation_timeout = std::env::var("ATELIER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(GENERATION_TIMEOUT);

        Self {
            api_key,
            api_base,
            model,
            max_inflight_per_session,
            generation_timeout,
        }
    }

    /// Fetch the API key or fail with the per-request configuration error.
    pub fn require_api_key(&self) -> Result<&str, GenerationError> {
        self.api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_inflight_per_session: 1,
            generation_timeout: GENERATION_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_key() {
        let config = AppConfig::default();
        assert!(config.api_key.is_none());
        assert!(matches!(
            config.require_api_key(),
            Err(GenerationError::MissingApiKey)
        ));
        assert_eq!(config.max_inflight_per_session, 1);
    }

    #[test]
    fn require_api_key_returns_configured_key() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
    }
}
