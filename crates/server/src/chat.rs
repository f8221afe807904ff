use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use fixfurn_agent::orchestrator::{Orchestrator, TurnError};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub catalog_count: usize,
    pub rule_count: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    /// Omitted on the first message; the response carries the assigned id
    /// and the client sends it back for session continuity.
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatError {
    pub error: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub catalog_count: usize,
    pub rule_count: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/chat", post(chat)).route("/health", get(health)).with_state(state)
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatError>)> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ChatError {
                error: "invalid_request",
                message: "message must be non-empty".to_string(),
            }),
        ));
    }

    let session_id = request
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        event_name = "server.chat.turn_start",
        session_id = %session_id,
        "handling user message"
    );

    match state.orchestrator.handle_user_message(&session_id, message).await {
        Ok(reply) => Ok(Json(ChatResponse { session_id, reply })),
        Err(TurnError::Backend(error)) => {
            warn!(
                event_name = "server.chat.backend_failure",
                session_id = %session_id,
                error = %error,
                "turn failed; session remains open for retry"
            );
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ChatError {
                    error: "backend_unavailable",
                    message: "The assistant is temporarily unreachable. Please send your message \
                              again in a moment."
                        .to_string(),
                }),
            ))
        }
    }
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.catalog_count > 0 && state.rule_count > 0;
    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        catalog_count: state.catalog_count,
        rule_count: state.rule_count,
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};

    use fixfurn_agent::llm::{BackendError, ChatBackend, ConversationEvent, ModelReply};
    use fixfurn_agent::orchestrator::{Orchestrator, TurnLimits};
    use fixfurn_agent::tools::{ToolRegistry, ToolSpec};

    use super::{chat, health, AppState, ChatRequest};

    struct CannedBackend {
        outcome: Result<&'static str, ()>,
    }

    #[async_trait]
    impl ChatBackend for CannedBackend {
        async fn reply(
            &self,
            _system_prompt: &str,
            _history: &[ConversationEvent],
            _tools: &[ToolSpec],
        ) -> Result<ModelReply, BackendError> {
            match self.outcome {
                Ok(text) => {
                    Ok(ModelReply { text: Some(text.to_string()), tool_calls: Vec::new() })
                }
                Err(()) => Err(BackendError::Timeout { elapsed_secs: 30 }),
            }
        }
    }

    fn state(outcome: Result<&'static str, ()>) -> AppState {
        let orchestrator = Orchestrator::new(
            Arc::new(CannedBackend { outcome }),
            ToolRegistry::default(),
            "prompt",
            TurnLimits::default(),
        );
        AppState { orchestrator: Arc::new(orchestrator), catalog_count: 12, rule_count: 9 }
    }

    #[tokio::test]
    async fn chat_returns_the_terminal_reply() {
        let request = ChatRequest {
            session_id: Some("s-1".to_string()),
            message: "hello there".to_string(),
        };

        let Json(response) = chat(State(state(Ok("Welcome in!"))), Json(request))
            .await
            .expect("chat should succeed");

        assert_eq!(response.session_id, "s-1");
        assert_eq!(response.reply, "Welcome in!");
    }

    #[tokio::test]
    async fn missing_session_id_gets_a_generated_one() {
        let request = ChatRequest { session_id: None, message: "hello".to_string() };

        let Json(response) = chat(State(state(Ok("Welcome in!"))), Json(request))
            .await
            .expect("chat should succeed");

        assert!(!response.session_id.is_empty());
    }

    #[tokio::test]
    async fn blank_input_is_a_bad_request() {
        let request =
            ChatRequest { session_id: Some("s-1".to_string()), message: "   ".to_string() };

        let (status, Json(error)) = chat(State(state(Ok("unused"))), Json(request))
            .await
            .expect_err("blank message must be rejected");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error.error, "invalid_request");
    }

    #[tokio::test]
    async fn backend_failure_maps_to_service_unavailable() {
        let request =
            ChatRequest { session_id: Some("s-1".to_string()), message: "hello".to_string() };

        let (status, Json(error)) = chat(State(state(Err(()))), Json(request))
            .await
            .expect_err("backend timeout must surface as 503");

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.error, "backend_unavailable");
        assert!(!error.message.is_empty());
    }

    #[tokio::test]
    async fn health_reports_ready_with_loaded_datasets() {
        let (status, Json(payload)) = health(State(state(Ok("unused")))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.catalog_count, 12);
    }

    #[tokio::test]
    async fn health_degrades_without_rules() {
        let mut state = state(Ok("unused"));
        state.rule_count = 0;

        let (status, Json(payload)) = health(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
    }
}
