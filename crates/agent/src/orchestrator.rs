use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::llm::{BackendError, ChatBackend, ConversationEvent, ModelReply};
use crate::tools::{ToolRegistry, ToolSpec};

/// Reply used when the loop bound trips before the model produced any text.
const FALLBACK_PARTIAL_REPLY: &str =
    "I couldn't finish working through that request. Here's where I got to so far - could you \
     rephrase or narrow it down?";

#[derive(Clone, Copy, Debug)]
pub struct TurnLimits {
    /// Maximum reasoning steps per user turn. Each step may propose tool
    /// calls; a misbehaving backend that never stops proposing gets cut off
    /// here and the turn ends with a partial reply.
    pub max_tool_iterations: u32,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self { max_tool_iterations: 6 }
    }
}

#[derive(Debug, Error)]
pub enum TurnError {
    /// The reasoning backend was unreachable or timed out. The turn fails
    /// but the session stays open for a retry on the next user input.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Per-session turn sequence. Owned by the store entry; one turn locks it
/// end-to-end, so reasoning and dispatch never interleave within a session.
#[derive(Debug, Default)]
pub struct ConversationState {
    events: Vec<ConversationEvent>,
}

#[derive(Default)]
struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<ConversationState>>>>,
}

impl SessionStore {
    async fn session(&self, session_id: &str) -> Arc<Mutex<ConversationState>> {
        let mut sessions = self.sessions.lock().await;
        Arc::clone(sessions.entry(session_id.to_string()).or_default())
    }
}

/// Drives the loop between the reasoning backend and the tool dispatcher
/// until the backend yields a reply with no further tool calls.
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
    registry: ToolRegistry,
    system_prompt: String,
    limits: TurnLimits,
    sessions: SessionStore,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        registry: ToolRegistry,
        system_prompt: impl Into<String>,
        limits: TurnLimits,
    ) -> Self {
        Self {
            backend,
            registry,
            system_prompt: system_prompt.into(),
            limits,
            sessions: SessionStore::default(),
        }
    }

    /// Synchronous caller-facing entry point: one user message in, one reply
    /// text out, with session continuity keyed by `session_id`.
    pub async fn handle_user_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<String, TurnError> {
        let session = self.sessions.session(session_id).await;
        let mut state = session.lock().await;
        let rollback_len = state.events.len();

        state.events.push(ConversationEvent::User { text: text.to_string() });

        match self.run_turn(session_id, &mut state).await {
            Ok(reply) => Ok(reply),
            Err(error) => {
                // Drop the failed turn so a retry starts from a consistent
                // history.
                state.events.truncate(rollback_len);
                Err(error)
            }
        }
    }

    /// Snapshot of a session's events, mainly for surfaces that render the
    /// transcript and for tests.
    pub async fn history(&self, session_id: &str) -> Vec<ConversationEvent> {
        let session = self.sessions.session(session_id).await;
        let state = session.lock().await;
        state.events.clone()
    }

    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    async fn run_turn(
        &self,
        session_id: &str,
        state: &mut ConversationState,
    ) -> Result<String, TurnError> {
        let specs = self.registry.specs();
        let mut last_model_text: Option<String> = None;

        for iteration in 0..self.limits.max_tool_iterations {
            let reply: ModelReply =
                self.backend.reply(&self.system_prompt, &state.events, &specs).await?;

            if let Some(reply_text) = reply.text.as_ref().filter(|text| !text.trim().is_empty()) {
                last_model_text = Some(reply_text.clone());
            }

            if reply.is_terminal() {
                let final_text =
                    last_model_text.unwrap_or_else(|| FALLBACK_PARTIAL_REPLY.to_string());
                state.events.push(ConversationEvent::Model { text: final_text.clone() });
                tracing::debug!(
                    event_name = "agent.turn.complete",
                    session_id,
                    iterations = iteration + 1,
                    "turn reached terminal reply"
                );
                return Ok(final_text);
            }

            if let Some(reply_text) = reply.text.filter(|text| !text.trim().is_empty()) {
                state.events.push(ConversationEvent::Model { text: reply_text });
            }

            // Tool calls resolve strictly in order; each result is in the
            // history before the next reasoning step runs.
            for request in reply.tool_calls {
                let name = request.name.clone();
                tracing::info!(
                    event_name = "agent.tool.dispatch",
                    session_id,
                    tool = %name,
                    "dispatching tool call"
                );
                let payload = match self.registry.dispatch(&request).await {
                    Ok(payload) => payload,
                    Err(error) => {
                        tracing::warn!(
                            event_name = "agent.tool.rejected",
                            session_id,
                            tool = %name,
                            error_class = error.error_class(),
                            "tool call failed; feeding failure back to the model"
                        );
                        error.model_payload()
                    }
                };
                state.events.push(ConversationEvent::ToolCall { request });
                state.events.push(ConversationEvent::ToolResult { name, payload });
            }
        }

        // Loop bound exceeded: fail safe with the best partial reply rather
        // than spinning against a backend that keeps proposing calls.
        tracing::warn!(
            event_name = "agent.turn.loop_bound_exceeded",
            session_id,
            max_tool_iterations = self.limits.max_tool_iterations,
            "turn exceeded the tool-call iteration bound"
        );
        let partial = last_model_text.unwrap_or_else(|| FALLBACK_PARTIAL_REPLY.to_string());
        state.events.push(ConversationEvent::Model { text: partial.clone() });
        Ok(partial)
    }
}
