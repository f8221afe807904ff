use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::tools::ToolSpec;

pub type JsonMap = serde_json::Map<String, Value>;

/// One operation proposed by the reasoning step. Transient: lives for a
/// single dispatch cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: JsonMap,
}

/// What the reasoning step produced for one turn: free text, tool-call
/// proposals, or both. No tool calls means the turn is terminal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    pub fn is_terminal(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Ordered turn record for one session. Append-only; the orchestrator owns
/// the sequence and threads it back to the backend on every reasoning step.
#[derive(Clone, Debug, PartialEq)]
pub enum ConversationEvent {
    User { text: String },
    Model { text: String },
    ToolCall { request: ToolCallRequest },
    ToolResult { name: String, payload: Value },
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("reasoning backend timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },
    #[error("reasoning backend unavailable: {message}")]
    Unavailable { message: String },
    #[error("reasoning backend returned an unusable reply: {message}")]
    Protocol { message: String },
}

impl BackendError {
    /// Timeouts and transport faults fail only the current turn; the
    /// session stays open for a retry on the next user input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }
}

/// Opaque reasoning-backend capability. The orchestrator sends the full
/// turn history plus the declared tool schemas and receives either a
/// free-text reply or structured tool-call proposals.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn reply(
        &self,
        system_prompt: &str,
        history: &[ConversationEvent],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, BackendError>;
}
