//! Feedback session records: the durable bridge between a suspended
//! workflow and the out-of-process client that answers its questions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which validator raised the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Sensitivity,
    Consistency,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Sensitivity => "sensitivity",
            SessionKind::Consistency => "consistency",
        }
    }
}

/// Session lifecycle. `Pending` is the only non-terminal status; exactly one
/// terminal transition happens per session, after which the record is
/// immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Completed,
    Expired,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

/// One suspension's questions and (eventually) its answers.
///
/// Invariant: `answers` is `Some` iff `status == Completed`, and its length
/// equals `questions.len()`. Enforced by the registry, which owns every
/// mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSession {
    pub session_id: String,
    /// Set when the session was raised by a suspension; `None` for sessions
    /// created directly over HTTP.
    #[serde(default)]
    pub workflow_id: Option<String>,
    pub kind: SessionKind,
    pub questions: Vec<String>,
    pub status: SessionStatus,
    #[serde(default)]
    pub answers: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}
