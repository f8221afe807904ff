//! Agent runtime - tool orchestration between conversation turns and the
//! deterministic backend operations.
//!
//! This crate is the "brain" of the fixfurn concierge:
//! - declares the callable tools and validates their arguments (`tools`)
//! - binds tools to the catalog, repair engine, and log sink (`handlers`)
//! - talks to the reasoning backend behind an opaque trait (`llm`, `gemini`)
//! - drives the per-session reasoning/dispatch loop (`orchestrator`)
//!
//! # Safety principle
//!
//! The model is strictly a translator. Prices and turnaround ranges come
//! from the catalog and the rule table; when rule coverage is missing the
//! customer gets an explicit "cannot estimate", never a guessed number.

pub mod gemini;
pub mod handlers;
pub mod llm;
pub mod orchestrator;
pub mod tools;

pub use llm::{BackendError, ChatBackend, ConversationEvent, JsonMap, ModelReply, ToolCallRequest};
pub use orchestrator::{Orchestrator, TurnError, TurnLimits};
pub use tools::{ArgKind, ArgSpec, ToolError, ToolHandler, ToolRegistry, ToolSpec};
