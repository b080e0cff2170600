//! The consuming side of a generation turn: a streaming client for the
//! `/api/generate` endpoint, exposed as library API.
//!
//! Events arrive on a bounded mpsc channel. The client guarantees the
//! channel carries at most one terminal event: frames after the terminal are
//! dropped, a stream that ends without one is converted into `Failed`, and a
//! turn that exceeds the generation timeout fails with the timeout message.

use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::config::GENERATION_TIMEOUT;
use crate::errors::GenerationError;
use crate::generate::{GenerationEvent, GenerationRequest};
use crate::sse::SseDecoder;

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
}

impl GenerationClient {
    /// `base_url` is the service root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Start one generation turn, returning the event channel.
    ///
    /// Validation failures are returned immediately; everything after that
    /// point is delivered in-band, ending in exactly one terminal event.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<mpsc::Receiver<GenerationEvent>, GenerationError> {
        request.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let http = self.http.clone();
        let url = format!("{}/api/generate", self.base_url);

        tokio::spawn(async move {
            match tokio::time::timeout(GENERATION_TIMEOUT, run_stream(http, url, request, &tx))
                .await
            {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => {
                    let _ = tx
                        .send(GenerationEvent::Failed {
                            message: GenerationError::MissingTerminal.to_string(),
                        })
                        .await;
                }
                Ok(Err(err)) => {
                    let _ = tx
                        .send(GenerationEvent::Failed {
                            message: err.to_string(),
                        })
                        .await;
                }
                Err(_elapsed) => {
                    let _ = tx
                        .send(GenerationEvent::Failed {
                            message: GenerationError::Timeout.to_string(),
                        })
                        .await;
                }
            }
        });

        Ok(rx)
    }

    /// Drive a turn to completion and return its events in order.
    pub async fn run_to_completion(
        &self,
        request: GenerationRequest,
    ) -> Result<Vec<GenerationEvent>, GenerationError> {
        let mut rx = self.generate(request).await?;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
        Ok(events)
    }
}

/// Returns `Ok(true)` once a terminal event has been delivered, `Ok(false)`
/// when the stream ended without one.
async fn run_stream(
    http: reqwest::Client,
    url: String,
    request: GenerationRequest,
    tx: &mpsc::Sender<GenerationEvent>,
) -> Result<bool, GenerationError> {
    let response = http.post(&url).json(&request).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or(body);
        return Err(GenerationError::Endpoint {
            status: status.as_u16(),
            message,
        });
    }

    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        for frame in decoder.push(&String::from_utf8_lossy(&bytes)) {
            let Some(event) = frame.to_event() else {
                continue;
            };
            let terminal = event.is_terminal();
            if tx.send(event).await.is_err() {
                return Ok(true); // receiver gone, nothing left to deliver
            }
            if terminal {
                return Ok(true);
            }
        }
    }

    Ok(false)
}
