//! The coordinator owns every session and drives generation turns through
//! the per-turn state machine.
//!
//! One turn: `begin_turn` validates and records the submission (user message
//! plus a loading acknowledgment), the upstream stream is relayed event by
//! event through `apply_event`, and the terminal event replaces all pending
//! messages with exactly one success or error message.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::codegen;
use crate::config::AppConfig;
use crate::errors::GenerationError;
use crate::generate::upstream::UpstreamClient;
use crate::generate::{GenerationEvent, GenerationRequest};
use crate::prompt;
use crate::session::{
    acknowledge_phrase, success_phrase, ChatMessage, ComponentRecord, Session, TurnState,
};

const EVENT_CHANNEL_CAPACITY: usize = 32;

pub struct Coordinator {
    config: AppConfig,
    upstream: UpstreamClient,
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl Coordinator {
    pub fn new(config: AppConfig) -> Self {
        let upstream = UpstreamClient::new(&config);
        Self {
            config,
            upstream,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn create_session(&self, selected_components: Vec<String>) -> Uuid {
        let mut session = Session::new();
        session.selected_components = selected_components;
        let id = session.id;
        self.sessions
            .lock()
            .expect("sessions lock poisoned")
            .insert(id, session);
        tracing::info!(session = %id, "session created");
        id
    }

    fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, GenerationError> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        let session = sessions
            .get_mut(&id)
            .ok_or(GenerationError::SessionNotFound { id: id.to_string() })?;
        Ok(f(session))
    }

    pub fn messages(&self, id: Uuid) -> Result<Vec<ChatMessage>, GenerationError> {
        self.with_session(id, |s| s.messages.clone())
    }

    pub fn partition(&self, id: Uuid) -> Result<crate::codegen::CodePartition, GenerationError> {
        self.with_session(id, |s| s.partition.clone())
    }

    pub fn turn_state(&self, id: Uuid) -> Result<TurnState, GenerationError> {
        self.with_session(id, |s| s.turn)
    }

    /// Record a new submission and build the upstream request for it.
    ///
    /// Rejects the turn when the session already has `max_inflight_per_session`
    /// turns running. On success the transcript gains the user message and a
    /// loading acknowledgment, and the session moves to `Submitting`.
    pub fn begin_turn(
        &self,
        id: Uuid,
        prompt: &str,
    ) -> Result<GenerationRequest, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::MissingField { field: "prompt" });
        }
        let max_inflight = self.config.max_inflight_per_session;

        self.with_session(id, |session| {
            if session.inflight >= max_inflight {
                return Err(GenerationError::TurnInFlight);
            }

            let is_follow_up = session.context.last_generated_code.is_some();
            let previous_prompts = session.user_prompts();

            session.messages.push(ChatMessage::user(prompt));
            session
                .messages
                .push(ChatMessage::loading(acknowledge_phrase(is_follow_up)));
            session.turn = TurnState::Submitting;
            session.inflight += 1;
            session.pending_prompt = Some(prompt.to_string());

            Ok(GenerationRequest {
                prompt: prompt.to_string(),
                components: session.selected_components.clone(),
                is_follow_up,
                previous_code: session.context.last_generated_code.clone(),
                previous_prompts,
                current_code: is_follow_up.then(|| session.partition.clone()),
            })
        })?
    }

    /// Advance the session state machine by one stream event.
    pub fn apply_event(&self, id: Uuid, event: &GenerationEvent) {
        let result = self.with_session(id, |session| match event {
            GenerationEvent::Started => {
                session.turn = TurnState::Streaming;
            }
            GenerationEvent::Progress { text, .. } => {
                session.turn = TurnState::Streaming;
                // Mutate the pending message in place rather than appending.
                if let Some(msg) = session.messages.iter_mut().rev().find(|m| m.is_pending()) {
                    *msg = ChatMessage::streaming(text.clone());
                } else {
                    session.messages.push(ChatMessage::streaming(text.clone()));
                }
            }
            GenerationEvent::Completed { code, explanation } => {
                let was_follow_up = session.context.last_generated_code.is_some();
                let prompt = session.pending_prompt.take().unwrap_or_default();

                session.context.last_generated_code = Some(code.clone());
                session.context.history.push(ComponentRecord {
                    prompt,
                    code: code.clone(),
                    timestamp: chrono::Utc::now(),
                });
                session.partition = codegen::normalize(code, &session.partition);

                session.messages.retain(|m| !m.is_pending());
                session.messages.push(ChatMessage::success(
                    success_phrase(was_follow_up, explanation),
                    code.clone(),
                ));
                session.turn = TurnState::Succeeded;
                session.inflight = session.inflight.saturating_sub(1);
            }
            GenerationEvent::Failed { message } => {
                session.pending_prompt = None;
                session.messages.retain(|m| !m.is_pending());
                session
                    .messages
                    .push(ChatMessage::error(format!("Error: {message}")));
                session.turn = TurnState::Failed;
                session.inflight = session.inflight.saturating_sub(1);
            }
        });
        if result.is_err() {
            tracing::warn!(session = %id, "dropping event for unknown session");
        }
    }

    /// Run one full turn: validate, record, stream from upstream, and apply
    /// every event to the session. The returned channel carries the same
    /// events for the caller's SSE response and ends after the terminal one.
    pub fn submit(
        self: &Arc<Self>,
        id: Uuid,
        prompt: String,
    ) -> Result<mpsc::Receiver<GenerationEvent>, GenerationError> {
        let api_key = self.config.require_api_key()?.to_string();
        let request = self.begin_turn(id, &prompt)?;
        Ok(self.spawn_turn(Some(id), api_key, request))
    }

    /// Run a generation without any session: validate, stream, and relay,
    /// touching no transcript. Backs the stateless `/api/generate` surface.
    pub fn stream_detached(
        self: &Arc<Self>,
        request: GenerationRequest,
    ) -> Result<mpsc::Receiver<GenerationEvent>, GenerationError> {
        let api_key = self.config.require_api_key()?.to_string();
        request.validate()?;
        Ok(self.spawn_turn(None, api_key, request))
    }

    fn spawn_turn(
        self: &Arc<Self>,
        session: Option<Uuid>,
        api_key: String,
        request: GenerationRequest,
    ) -> mpsc::Receiver<GenerationEvent> {
        let prompts = prompt::build(&request);
        let is_follow_up = request.is_follow_up;

        let (raw_tx, raw_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (out_tx, out_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let upstream = self.upstream.clone();
        tokio::spawn(async move {
            if let Err(err) = upstream
                .stream_generation(&api_key, &prompts, is_follow_up, &raw_tx)
                .await
            {
                tracing::error!(%err, "generation stream failed");
                let _ = raw_tx
                    .send(GenerationEvent::Failed {
                        message: err.to_string(),
                    })
                    .await;
            }
        });

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.relay_events(session, raw_rx, out_tx).await;
        });

        out_rx
    }

    /// Forward events from the producer to the consumer, applying each to
    /// the session when one is attached. Guarantees exactly one terminal
    /// event: the generation timeout and a silently closed producer both
    /// become `Failed`.
    async fn relay_events(
        &self,
        session: Option<Uuid>,
        mut raw_rx: mpsc::Receiver<GenerationEvent>,
        out_tx: mpsc::Sender<GenerationEvent>,
    ) {
        let deadline = tokio::time::sleep(self.config.generation_timeout);
        tokio::pin!(deadline);

        loop {
            let event = tokio::select! {
                maybe = raw_rx.recv() => match maybe {
                    Some(event) => event,
                    None => GenerationEvent::Failed {
                        message: GenerationError::MissingTerminal.to_string(),
                    },
                },
                _ = &mut deadline => GenerationEvent::Failed {
                    message: GenerationError::Timeout.to_string(),
                },
            };

            let terminal = event.is_terminal();
            if let Some(id) = session {
                self.apply_event(id, &event);
            }
            let _ = out_tx.send(event).await;
            if terminal {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MessageStatus;

    fn coordinator() -> Coordinator {
        Coordinator::new(AppConfig::default())
    }

    #[test]
    fn begin_turn_records_user_message_and_acknowledgment() {
        let coord = coordinator();
        let id = coord.create_session(vec!["Alert".into()]);

        let request = coord.begin_turn(id, "a benefits form").unwrap();
        assert!(!request.is_follow_up);
        assert_eq!(request.components, vec!["Alert".to_string()]);
        assert!(request.previous_prompts.is_empty());
        assert!(request.current_code.is_none());

        let messages = coord.messages(id).unwrap();
        let last_two = &messages[messages.len() - 2..];
        assert_eq!(last_two[0].role, crate::session::Role::User);
        assert_eq!(last_two[0].content, "a benefits form");
        assert!(last_two[1].is_pending());
        assert_eq!(coord.turn_state(id).unwrap(), TurnState::Submitting);
    }

    #[test]
    fn blank_prompt_is_rejected_without_touching_the_session() {
        let coord = coordinator();
        let id = coord.create_session(Vec::new());
        assert!(matches!(
            coord.begin_turn(id, "  ").unwrap_err(),
            GenerationError::MissingField { field: "prompt" }
        ));
        assert_eq!(coord.messages(id).unwrap().len(), 1);
        assert_eq!(coord.turn_state(id).unwrap(), TurnState::Idle);
    }

    #[test]
    fn unknown_session_is_an_error() {
        let coord = coordinator();
        assert!(matches!(
            coord.begin_turn(Uuid::new_v4(), "hi").unwrap_err(),
            GenerationError::SessionNotFound { .. }
        ));
    }

    #[test]
    fn second_submission_while_in_flight_is_rejected() {
        let coord = coordinator();
        let id = coord.create_session(Vec::new());
        coord.begin_turn(id, "first").unwrap();
        assert!(matches!(
            coord.begin_turn(id, "second").unwrap_err(),
            GenerationError::TurnInFlight
        ));
    }

    #[test]
    fn full_turn_leaves_one_success_message_and_no_pending() {
        let coord = coordinator();
        let id = coord.create_session(Vec::new());
        coord.begin_turn(id, "a form").unwrap();

        coord.apply_event(id, &GenerationEvent::Started);
        for i in 0..3 {
            coord.apply_event(
                id,
                &GenerationEvent::Progress {
                    text: format!("Generating component... ({i})"),
                    fraction: 0.1 * i as f32,
                },
            );
        }
        coord.apply_event(
            id,
            &GenerationEvent::Completed {
                code: "function App() {\n  return (\n    <div>done</div>\n  );\n}".into(),
                explanation: "All set.".into(),
            },
        );

        let messages = coord.messages(id).unwrap();
        assert!(messages.iter().all(|m| !m.is_pending()));
        let successes: Vec<_> = messages
            .iter()
            .filter(|m| m.status == MessageStatus::Success)
            .collect();
        assert_eq!(successes.len(), 1);
        assert!(successes[0].generated_code.is_some());
        assert_eq!(coord.turn_state(id).unwrap(), TurnState::Succeeded);

        let partition = coord.partition(id).unwrap();
        assert!(partition.js.contains("function App"));
    }

    #[test]
    fn progress_mutates_the_pending_message_in_place() {
        let coord = coordinator();
        let id = coord.create_session(Vec::new());
        coord.begin_turn(id, "a form").unwrap();
        let before = coord.messages(id).unwrap().len();

        coord.apply_event(
            id,
            &GenerationEvent::Progress {
                text: "Generating component...".into(),
                fraction: 0.3,
            },
        );
        coord.apply_event(
            id,
            &GenerationEvent::Progress {
                text: "Still generating...".into(),
                fraction: 0.5,
            },
        );

        let messages = coord.messages(id).unwrap();
        assert_eq!(messages.len(), before);
        assert_eq!(messages.last().unwrap().content, "Still generating...");
        assert_eq!(messages.last().unwrap().status, MessageStatus::Streaming);
    }

    #[test]
    fn failure_replaces_pending_with_one_error_message() {
        let coord = coordinator();
        let id = coord.create_session(Vec::new());
        coord.begin_turn(id, "a form").unwrap();
        coord.apply_event(id, &GenerationEvent::Started);
        coord.apply_event(
            id,
            &GenerationEvent::Failed {
                message: GenerationError::Timeout.to_string(),
            },
        );

        let messages = coord.messages(id).unwrap();
        assert!(messages.iter().all(|m| !m.is_pending()));
        let last = messages.last().unwrap();
        assert_eq!(last.status, MessageStatus::Error);
        assert!(last.content.contains("Request timed out"));
        assert_eq!(coord.turn_state(id).unwrap(), TurnState::Failed);

        // Failure is a resting state; the next turn may begin.
        assert!(coord.begin_turn(id, "try again").is_ok());
    }

    #[test]
    fn follow_up_turn_carries_prior_context() {
        let coord = coordinator();
        let id = coord.create_session(Vec::new());
        coord.begin_turn(id, "a form").unwrap();
        coord.apply_event(
            id,
            &GenerationEvent::Completed {
                code: "function App() {\n  return (\n    <div>v1</div>\n  );\n}".into(),
                explanation: String::new(),
            },
        );

        let request = coord.begin_turn(id, "make it blue").unwrap();
        assert!(request.is_follow_up);
        assert!(request.previous_code.as_deref().unwrap().contains("v1"));
        assert_eq!(request.previous_prompts, vec!["a form"]);
        assert!(request.current_code.is_some());
    }
}
