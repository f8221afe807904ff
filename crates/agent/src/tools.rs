use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm::{JsonMap, ToolCallRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl ArgKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
    pub description: &'static str,
}

impl ArgSpec {
    pub fn required(name: &'static str, kind: ArgKind, description: &'static str) -> Self {
        Self { name, kind, required: true, description }
    }

    pub fn optional(name: &'static str, kind: ArgKind, description: &'static str) -> Self {
        Self { name, kind, required: false, description }
    }
}

/// Static declaration of one callable operation: the schema the reasoning
/// backend sees and the contract the dispatcher validates against.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub args: Vec<ArgSpec>,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{name}`")]
    UnknownTool { name: String },
    #[error("invalid arguments for `{tool}`: {}", problems.join("; "))]
    InvalidArguments { tool: String, problems: Vec<String> },
    #[error("tool `{tool}` failed: {message}")]
    HandlerFailure { tool: String, message: String },
}

impl ToolError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::HandlerFailure { .. } => "handler_failure",
        }
    }

    /// Structured failure payload fed back to the reasoning step so the
    /// conversation can continue. Always carries a non-empty message.
    pub fn model_payload(&self) -> Value {
        serde_json::json!({
            "ok": false,
            "error": self.error_class(),
            "message": self.to_string(),
        })
    }
}

/// A bound tool handler. Handlers are read-only against the catalog and
/// rule table and append-only against the log sink; any internal fault they
/// return is caught at the dispatch boundary.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> &ToolSpec;
    async fn call(&self, arguments: &JsonMap) -> anyhow::Result<Value>;
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: ToolHandler + 'static,
    {
        self.tools.push(Arc::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declared schemas in registration order, for the reasoning backend.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec().clone()).collect()
    }

    /// Validates and executes one proposed call. Validation failures never
    /// invoke the handler; handler faults never propagate past here.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> Result<Value, ToolError> {
        let Some(tool) = self.tools.iter().find(|tool| tool.spec().name == request.name) else {
            return Err(ToolError::UnknownTool { name: request.name.clone() });
        };

        let spec = tool.spec();
        let problems = validate_arguments(spec, &request.arguments);
        if !problems.is_empty() {
            return Err(ToolError::InvalidArguments { tool: spec.name.to_string(), problems });
        }

        match tool.call(&request.arguments).await {
            Ok(payload) => Ok(payload),
            Err(error) => {
                tracing::error!(
                    event_name = "agent.tool.handler_failure",
                    tool = spec.name,
                    error = %format!("{error:#}"),
                    "tool handler returned an internal fault"
                );
                Err(ToolError::HandlerFailure {
                    tool: spec.name.to_string(),
                    message: "internal fault while executing the tool; the incident was logged"
                        .to_string(),
                })
            }
        }
    }
}

/// Missing required arguments, unknown argument names, and type mismatches,
/// all collected so the reasoning step gets one complete correction.
fn validate_arguments(spec: &ToolSpec, arguments: &JsonMap) -> Vec<String> {
    let mut problems = Vec::new();

    for arg in &spec.args {
        match arguments.get(arg.name) {
            None | Some(Value::Null) => {
                if arg.required {
                    problems.push(format!("missing required argument `{}`", arg.name));
                }
            }
            Some(value) => {
                if !arg.kind.accepts(value) {
                    problems.push(format!(
                        "argument `{}` must be a {}",
                        arg.name,
                        arg.kind.as_str()
                    ));
                }
            }
        }
    }

    for name in arguments.keys() {
        if !spec.args.iter().any(|arg| arg.name == name) {
            problems.push(format!("unknown argument `{name}`"));
        }
    }

    problems
}
