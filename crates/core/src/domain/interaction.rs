use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only facts produced by the tool handlers. Each variant is written
/// as one self-contained line in its own log file and is never read back or
/// mutated by the running process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InteractionRecord {
    Lead {
        name: String,
        email: String,
        intent: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        recorded_at: DateTime<Utc>,
    },
    UnresolvedQuestion {
        question: String,
        recorded_at: DateTime<Utc>,
    },
    ServiceFeedback {
        email: String,
        name: String,
        service_type: String,
        satisfaction: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        comments: Option<String>,
        recorded_at: DateTime<Utc>,
    },
}

impl InteractionRecord {
    /// Stable per-kind log file stem.
    pub fn log_stem(&self) -> &'static str {
        match self {
            Self::Lead { .. } => "leads",
            Self::UnresolvedQuestion { .. } => "feedback",
            Self::ServiceFeedback { .. } => "service_feedback",
        }
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            Self::Lead { recorded_at, .. }
            | Self::UnresolvedQuestion { recorded_at, .. }
            | Self::ServiceFeedback { recorded_at, .. } => *recorded_at,
        }
    }
}
