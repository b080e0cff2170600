//! The producing side of a generation turn: one streaming call to the
//! upstream model API, surfaced as a sequence of `GenerationEvent`s.
//!
//! Mirrors the upstream's responses API: POST with `stream: true`, then a
//! `data:`-framed stream of typed events whose text deltas are accumulated
//! into the final component source. A break mid-stream with content already
//! accumulated is salvaged into a partial result instead of failing the turn.

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::errors::GenerationError;
use crate::generate::GenerationEvent;
use crate::prompt::PromptPair;
use crate::sse::DataLineDecoder;
use crate::codegen;

/// Progress is reported on every Nth content chunk.
const PROGRESS_EVERY: usize = 5;

/// Fraction model: starts at 0.1, grows with accumulated length, capped
/// below 1.0 so the bar never completes before the terminal event.
fn progress_fraction(accumulated_len: usize) -> f32 {
    (0.1 + accumulated_len as f32 / 500.0).min(0.9)
}

#[derive(Debug, Deserialize)]
struct UpstreamChunk {
    #[serde(rename = "type")]
    kind: Option<String>,
    delta: Option<String>,
    text: Option<String>,
}

impl UpstreamChunk {
    fn content(&self) -> Option<&str> {
        if let Some(kind) = &self.kind {
            if kind.contains("error") {
                return None;
            }
        }
        self.delta.as_deref().or(self.text.as_deref()).filter(|s| !s.is_empty())
    }
}

/// Client for the upstream model API.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
}

impl UpstreamClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            model: config.model.clone(),
        }
    }

    /// Run one generation turn, delivering events to `tx`.
    ///
    /// Emits `Started`, periodic `Progress`, and `Completed` on `tx`; returns
    /// an error only when nothing salvageable was produced, leaving the
    /// caller to emit the terminal failure frame.
    pub async fn stream_generation(
        &self,
        api_key: &str,
        prompts: &PromptPair,
        is_follow_up: bool,
        tx: &mpsc::Sender<GenerationEvent>,
    ) -> Result<(), GenerationError> {
        let response = self
            .http
            .post(format!("{}/responses", self.api_base))
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.model,
                "input": [
                    { "role": "system", "content": prompts.system },
                    { "role": "user", "content": prompts.user },
                ],
                "stream": true,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        if tx.send(GenerationEvent::Started).await.is_err() {
            return Ok(()); // caller went away
        }

        let progress_text = if is_follow_up {
            "Updating component..."
        } else {
            "Generating component..."
        };

        let mut accumulated = String::new();
        let mut chunk_count = 0usize;
        let mut decoder = DataLineDecoder::new();
        let mut stream = response.bytes_stream();
        let mut stream_error: Option<GenerationError> = None;

        'outer: while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    stream_error = Some(err.into());
                    break;
                }
            };
            for payload in decoder.push(&String::from_utf8_lossy(&bytes)) {
                if payload == "[DONE]" {
                    break 'outer;
                }
                let parsed = match serde_json::from_str::<UpstreamChunk>(&payload) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        tracing::warn!(%err, "skipping malformed upstream chunk");
                        continue;
                    }
                };
                if let Some(content) = parsed.content() {
                    accumulated.push_str(content);
                    if chunk_count % PROGRESS_EVERY == 0 {
                        let event = GenerationEvent::Progress {
                            text: progress_text.to_string(),
                            fraction: progress_fraction(accumulated.len()),
                        };
                        if tx.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                    chunk_count += 1;
                }
            }
        }

        if let Some(err) = stream_error {
            if accumulated.is_empty() {
                return Err(err);
            }
            tracing::warn!(%err, chars = accumulated.len(), "stream broke, salvaging partial result");
            let event = GenerationEvent::Completed {
                code: partial_result(&accumulated),
                explanation: "Generation was interrupted. Partial result shown.".to_string(),
            };
            let _ = tx.send(event).await;
            return Ok(());
        }

        tracing::debug!(chars = accumulated.len(), "generation stream finished");

        let code = codegen::finalize(&accumulated);
        let explanation = if is_follow_up {
            "Your component has been updated with the requested changes."
        } else {
            "Your component has been created successfully."
        };
        let _ = tx
            .send(GenerationEvent::Completed {
                code,
                explanation: explanation.to_string(),
            })
            .await;
        Ok(())
    }
}

/// Wrap salvaged partial output in a visible warning banner.
fn partial_result(accumulated: &str) -> String {
    format!(
        "function App() {{\n  return (\n    <div className=\"vads-l-grid-container\">\n      <va-alert status=\"warning\" visible>\n        <h2 slot=\"headline\">Partial Result</h2>\n        <p>The generation was interrupted. Here's what was generated so far:</p>\n      </va-alert>\n      {}\n    </div>\n  );\n}}",
        accumulated
    )
}
