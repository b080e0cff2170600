//! Wire format for the generation event stream.
//!
//! The `/api/generate` endpoint speaks server-sent events where every frame
//! is a `data:` line carrying a JSON envelope:
//!
//! ```text
//! data: {"event":"response.progress","data":"{\"progress\":0.4,\"text\":\"...\"}"}
//! ```
//!
//! The inner `data` field is itself a JSON-encoded string, a quirk kept for
//! compatibility with existing consumers. `SseDecoder` turns an arbitrary
//! chunking of those bytes back into frames; unknown event names are ignored
//! (forward compatibility) and malformed payloads are logged and skipped
//! without aborting the stream.

use serde::{Deserialize, Serialize};

use crate::generate::GenerationEvent;

pub const EVENT_START: &str = "response.start";
pub const EVENT_PROGRESS: &str = "response.progress";
pub const EVENT_COMPLETED: &str = "response.completed";
pub const EVENT_ERROR: &str = "response.error";

/// One SSE frame envelope as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    /// JSON-encoded payload string.
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartPayload {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletedPayload {
    pub success: bool,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

impl Frame {
    fn new<P: Serialize>(event: &str, payload: &P) -> Self {
        Self {
            event: event.to_string(),
            // Payloads here are plain structs; serialization cannot fail.
            data: serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string()),
        }
    }

    /// Encode a normalized event into its wire envelope.
    pub fn from_event(event: &GenerationEvent) -> Self {
        match event {
            GenerationEvent::Started => Frame::new(EVENT_START, &StartPayload { success: true }),
            GenerationEvent::Progress { text, fraction } => Frame::new(
                EVENT_PROGRESS,
                &ProgressPayload {
                    progress: *fraction,
                    text: text.clone(),
                },
            ),
            GenerationEvent::Completed { code, explanation } => Frame::new(
                EVENT_COMPLETED,
                &CompletedPayload {
                    success: true,
                    done: true,
                    code: code.clone(),
                    explanation: explanation.clone(),
                },
            ),
            GenerationEvent::Failed { message } => Frame::new(
                EVENT_ERROR,
                &ErrorPayload {
                    success: false,
                    error: message.clone(),
                },
            ),
        }
    }

    /// Decode the envelope back into a normalized event.
    ///
    /// Returns `None` for unrecognized event names (skipped by policy) and
    /// for payloads that fail to parse (logged, stream continues).
    pub fn to_event(&self) -> Option<GenerationEvent> {
        match self.event.as_str() {
            EVENT_START => Some(GenerationEvent::Started),
            EVENT_PROGRESS => match serde_json::from_str::<ProgressPayload>(&self.data) {
                Ok(p) => Some(GenerationEvent::Progress {
                    text: p.text,
                    fraction: p.progress.clamp(0.0, 1.0),
                }),
                Err(err) => {
                    tracing::warn!(%err, "skipping malformed progress payload");
                    None
                }
            },
            EVENT_COMPLETED => match serde_json::from_str::<CompletedPayload>(&self.data) {
                Ok(p) => Some(GenerationEvent::Completed {
                    code: p.code,
                    explanation: p.explanation,
                }),
                Err(err) => {
                    tracing::warn!(%err, "skipping malformed completed payload");
                    None
                }
            },
            EVENT_ERROR => match serde_json::from_str::<ErrorPayload>(&self.data) {
                Ok(p) => Some(GenerationEvent::Failed {
                    message: if p.error.is_empty() {
                        "An error occurred during generation".to_string()
                    } else {
                        p.error
                    },
                }),
                Err(err) => {
                    tracing::warn!(%err, "skipping malformed error payload");
                    None
                }
            },
            other => {
                tracing::debug!(event = other, "ignoring unrecognized stream event");
                None
            }
        }
    }

    /// Render as raw SSE bytes (`data: {...}\n\n`).
    pub fn to_wire(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("data: {}\n\n", json)
    }
}

/// Incremental splitter for `data:` framed SSE bytes.
///
/// Chunks may split frames anywhere; the splitter buffers until a blank-line
/// terminator arrives and yields the raw payload of each `data:` line.
/// Comments, `event:` lines, and keep-alives are dropped.
#[derive(Debug, Default)]
pub struct DataLineDecoder {
    buffer: String,
}

impl DataLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut payloads = Vec::new();

        while let Some(idx) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..idx + 2).collect();
            for line in block.lines() {
                if let Some(payload) = line.trim().strip_prefix("data:") {
                    payloads.push(payload.trim().to_string());
                }
            }
        }

        payloads
    }
}

/// Incremental decoder for the `{event, data}` framed stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: DataLineDecoder,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every complete frame it finished.
    pub fn push(&mut self, chunk: &str) -> Vec<Frame> {
        self.lines
            .push(chunk)
            .into_iter()
            .filter_map(|payload| match serde_json::from_str::<Frame>(&payload) {
                Ok(frame) => Some(frame),
                Err(err) => {
                    tracing::warn!(%err, payload, "skipping malformed stream frame");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(event: &GenerationEvent) -> String {
        Frame::from_event(event).to_wire()
    }

    #[test]
    fn decodes_a_complete_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(&wire(&GenerationEvent::Started));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, EVENT_START);
        assert!(matches!(frames[0].to_event(), Some(GenerationEvent::Started)));
    }

    #[test]
    fn reassembles_frames_split_across_chunks() {
        let raw = wire(&GenerationEvent::Progress {
            text: "Generating component...".into(),
            fraction: 0.4,
        });
        let (a, b) = raw.split_at(17);

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(a).is_empty());
        let frames = decoder.push(b);
        assert_eq!(frames.len(), 1);
        match frames[0].to_event() {
            Some(GenerationEvent::Progress { text, fraction }) => {
                assert_eq!(text, "Generating component...");
                assert!((fraction - 0.4).abs() < f32::EPSILON);
            }
            other => panic!("expected progress event, got {:?}", other),
        }
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut raw = wire(&GenerationEvent::Started);
        raw.push_str(&wire(&GenerationEvent::Completed {
            code: "function App() {}".into(),
            explanation: "Done".into(),
        }));

        let mut decoder = SseDecoder::new();
        let frames = decoder.push(&raw);
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn malformed_json_is_skipped_without_aborting() {
        let mut decoder = SseDecoder::new();
        let mut raw = "data: {not valid json\n\n".to_string();
        raw.push_str(&wire(&GenerationEvent::Started));
        let frames = decoder.push(&raw);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, EVENT_START);
    }

    #[test]
    fn unknown_event_names_decode_to_none() {
        let frame = Frame {
            event: "response.future_thing".into(),
            data: "{}".into(),
        };
        assert!(frame.to_event().is_none());
    }

    #[test]
    fn malformed_payload_inside_known_event_is_skipped() {
        let frame = Frame {
            event: EVENT_COMPLETED.into(),
            data: "not json".into(),
        };
        assert!(frame.to_event().is_none());
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(": keep-alive\nevent: data\n\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn completed_round_trips_through_the_envelope() {
        let event = GenerationEvent::Completed {
            code: "function App() { return null; }".into(),
            explanation: "Your component has been created successfully.".into(),
        };
        let decoded = Frame::from_event(&event).to_event().unwrap();
        match decoded {
            GenerationEvent::Completed { code, explanation } => {
                assert!(code.contains("function App"));
                assert!(explanation.contains("created"));
            }
            other => panic!("expected completed, got {:?}", other),
        }
    }

    #[test]
    fn progress_fraction_is_clamped_to_unit_range() {
        let frame = Frame {
            event: EVENT_PROGRESS.into(),
            data: r#"{"progress": 3.5, "text": "x"}"#.into(),
        };
        match frame.to_event() {
            Some(GenerationEvent::Progress { fraction, .. }) => {
                assert!((fraction - 1.0).abs() < f32::EPSILON)
            }
            other => panic!("expected progress, got {:?}", other),
        }
    }
}
