use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use fixfurn_core::config::LlmConfig;

use crate::llm::{BackendError, ChatBackend, ConversationEvent, ModelReply, ToolCallRequest};
use crate::tools::ToolSpec;

/// Matches the original concierge: low temperature keeps the translator
/// predictable, AUTO lets the model decide when to call tools.
const TEMPERATURE: f32 = 0.2;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations>,
    tool_config: ToolConfig,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), function_call: None, function_response: None }
    }
}

#[derive(Debug, Serialize)]
struct FunctionCall {
    name: String,
    args: Value,
}

#[derive(Debug, Serialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: &'static str,
    description: &'static str,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Serialize)]
struct FunctionCallingConfig {
    mode: &'static str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    text: Option<String>,
    function_call: Option<CandidateFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct CandidateFunctionCall {
    name: String,
    args: Option<Value>,
}

/// Reasoning backend over the generateContent REST endpoint.
pub struct GeminiBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    timeout_secs: u64,
    max_retries: u32,
}

impl GeminiBackend {
    pub fn from_config(config: &LlmConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().unwrap_or_else(|| String::new().into()),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn send_once(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<ModelReply, BackendError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|error| self.map_transport_error(error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Unavailable {
                message: format!("generateContent returned HTTP {status}"),
            });
        }

        let body: GenerateContentResponse =
            response.json().await.map_err(|error| BackendError::Protocol {
                message: format!("could not decode generateContent body: {error}"),
            })?;

        parse_reply(body)
    }

    fn map_transport_error(&self, error: reqwest::Error) -> BackendError {
        if error.is_timeout() {
            BackendError::Timeout { elapsed_secs: self.timeout_secs }
        } else {
            BackendError::Unavailable { message: error.to_string() }
        }
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    async fn reply(
        &self,
        system_prompt: &str,
        history: &[ConversationEvent],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, BackendError> {
        let request = build_request(system_prompt, history, tools);

        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Ok(reply) => return Ok(reply),
                // Transient transport faults retry; timeouts and protocol
                // errors go straight back to the orchestrator.
                Err(BackendError::Unavailable { message }) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        event_name = "agent.backend.retry",
                        attempt,
                        max_retries = self.max_retries,
                        error = %message,
                        "reasoning backend unavailable; retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn build_request(
    system_prompt: &str,
    history: &[ConversationEvent],
    tools: &[ToolSpec],
) -> GenerateContentRequest {
    GenerateContentRequest {
        system_instruction: Content { role: None, parts: vec![Part::text(system_prompt)] },
        contents: build_contents(history),
        tools: if tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolDeclarations {
                function_declarations: tools.iter().map(declare_function).collect(),
            }]
        },
        tool_config: ToolConfig { function_calling_config: FunctionCallingConfig { mode: "AUTO" } },
        generation_config: GenerationConfig { temperature: TEMPERATURE },
    }
}

fn build_contents(history: &[ConversationEvent]) -> Vec<Content> {
    history
        .iter()
        .map(|event| match event {
            ConversationEvent::User { text } => {
                Content { role: Some("user"), parts: vec![Part::text(text.clone())] }
            }
            ConversationEvent::Model { text } => {
                Content { role: Some("model"), parts: vec![Part::text(text.clone())] }
            }
            ConversationEvent::ToolCall { request } => Content {
                role: Some("model"),
                parts: vec![Part {
                    text: None,
                    function_call: Some(FunctionCall {
                        name: request.name.clone(),
                        args: Value::Object(request.arguments.clone()),
                    }),
                    function_response: None,
                }],
            },
            ConversationEvent::ToolResult { name, payload } => Content {
                role: Some("tool"),
                parts: vec![Part {
                    text: None,
                    function_call: None,
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: payload.clone(),
                    }),
                }],
            },
        })
        .collect()
}

fn declare_function(spec: &ToolSpec) -> FunctionDeclaration {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for arg in &spec.args {
        properties.insert(
            arg.name.to_string(),
            json!({ "type": arg.kind.as_str(), "description": arg.description }),
        );
        if arg.required {
            required.push(arg.name);
        }
    }

    FunctionDeclaration {
        name: spec.name,
        description: spec.description,
        parameters: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

fn parse_reply(body: GenerateContentResponse) -> Result<ModelReply, BackendError> {
    let Some(candidate) = body.candidates.into_iter().next() else {
        return Err(BackendError::Protocol {
            message: "generateContent returned no candidates".to_string(),
        });
    };

    let mut reply = ModelReply::default();
    let parts = candidate.content.map(|content| content.parts).unwrap_or_default();

    let mut text = String::new();
    for part in parts {
        if let Some(fragment) = part.text {
            text.push_str(&fragment);
        }
        if let Some(call) = part.function_call {
            let arguments = match call.args {
                Some(Value::Object(map)) => map,
                Some(other) => {
                    return Err(BackendError::Protocol {
                        message: format!(
                            "function call `{}` carried non-object args: {other}",
                            call.name
                        ),
                    });
                }
                None => serde_json::Map::new(),
            };
            reply.tool_calls.push(ToolCallRequest { name: call.name, arguments });
        }
    }

    if !text.trim().is_empty() {
        reply.text = Some(text);
    }

    Ok(reply)
}
