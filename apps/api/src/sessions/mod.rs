//! Feedback session registry.
//!
//! A session is a set of questions parked for a human. The registry owns the
//! full lifecycle (pending, completed, expired, cancelled), runs one expiry
//! task per session, and exposes a polling wait used by suspended workflows.
//! No global statics: the registry is owned by `AppState` and injected
//! explicitly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::session::{FeedbackSession, SessionKind, SessionStatus};

pub mod handlers;

/// Parameters for opening a session. Suspended workflows pass a
/// deterministic `session_id` derived from their suspension token; HTTP
/// callers usually leave it unset and get a generated one.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSession {
    pub kind: SessionKind,
    pub questions: Vec<String>,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
}

/// Result of a submit or cancel attempt. Terminal states are exclusive, so
/// a second transition reports what the session already is instead of
/// mutating it.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted(FeedbackSession),
    NotFound,
    AlreadyTerminal(SessionStatus),
    AnswerCountMismatch { expected: usize, received: usize },
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, FeedbackSession>>,
    default_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(default_ttl: Duration) -> Self {
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Opens a session and schedules its expiry task. Rejects duplicate ids
    /// so a retried suspension cannot shadow a live session.
    pub fn create(self: &Arc<Self>, request: CreateSession) -> Result<FeedbackSession, AppError> {
        let session_id = request
            .session_id
            .unwrap_or_else(|| format!("fb_{}", Uuid::new_v4().simple()));
        let ttl = request
            .ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_ttl);
        let now = Utc::now();

        let session = FeedbackSession {
            session_id: session_id.clone(),
            workflow_id: request.workflow_id,
            kind: request.kind,
            questions: request.questions,
            status: SessionStatus::Pending,
            answers: None,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl.as_secs() as i64),
            completed_at: None,
        };

        {
            let mut sessions = self
                .sessions
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if sessions.contains_key(&session_id) {
                return Err(AppError::Conflict(format!(
                    "Feedback session {session_id} already exists"
                )));
            }
            sessions.insert(session_id.clone(), session.clone());
        }

        self.spawn_expiry(session_id.clone(), ttl);
        info!(
            "feedback session {session_id} opened ({} questions, ttl {}s)",
            session.questions.len(),
            ttl.as_secs()
        );
        Ok(session)
    }

    /// Snapshot of one session.
    pub fn get(&self, session_id: &str) -> Option<FeedbackSession> {
        let sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions.get(session_id).cloned()
    }

    /// All sessions, newest first.
    pub fn list(&self) -> Vec<FeedbackSession> {
        let sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut all: Vec<FeedbackSession> = sessions.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// Records human answers. Only a pending session with a matching answer
    /// count transitions to completed.
    pub fn submit(&self, session_id: &str, answers: Vec<String>) -> SubmitOutcome {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(session) = sessions.get_mut(session_id) else {
            return SubmitOutcome::NotFound;
        };
        if session.status.is_terminal() {
            return SubmitOutcome::AlreadyTerminal(session.status);
        }
        if answers.len() != session.questions.len() {
            return SubmitOutcome::AnswerCountMismatch {
                expected: session.questions.len(),
                received: answers.len(),
            };
        }
        session.answers = Some(answers);
        session.status = SessionStatus::Completed;
        session.completed_at = Some(Utc::now());
        SubmitOutcome::Accepted(session.clone())
    }

    /// Cancels a pending session. Its workflow will observe the terminal
    /// state on the next poll and degrade.
    pub fn cancel(&self, session_id: &str) -> SubmitOutcome {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(session) = sessions.get_mut(session_id) else {
            return SubmitOutcome::NotFound;
        };
        if session.status.is_terminal() {
            return SubmitOutcome::AlreadyTerminal(session.status);
        }
        session.status = SessionStatus::Cancelled;
        SubmitOutcome::Accepted(session.clone())
    }

    /// Pending -> Expired, once. Returns false when the session already
    /// reached a terminal state.
    fn expire(&self, session_id: &str) -> bool {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match sessions.get_mut(session_id) {
            Some(session) if session.status == SessionStatus::Pending => {
                session.status = SessionStatus::Expired;
                true
            }
            _ => false,
        }
    }

    fn spawn_expiry(self: &Arc<Self>, session_id: String, ttl: Duration) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if registry.expire(&session_id) {
                info!("feedback session {session_id} expired unanswered");
            }
        });
    }

    /// Polls a session until it completes, returning the answers. Any
    /// terminal-without-answers outcome (expired, cancelled, unknown id) and
    /// the overall deadline both surface as [`AppError::FeedbackTimeout`],
    /// which suspended workflows treat as "degrade and move on".
    pub async fn wait_for_answers(
        &self,
        session_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Vec<String>, AppError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut ticker = tokio::time::interval(poll_interval);

        loop {
            ticker.tick().await;

            match self.get(session_id) {
                Some(session) => match session.status {
                    SessionStatus::Completed => {
                        return session.answers.ok_or_else(|| {
                            AppError::Internal(anyhow::anyhow!(
                                "completed session {session_id} has no answers"
                            ))
                        });
                    }
                    SessionStatus::Expired | SessionStatus::Cancelled => {
                        return Err(AppError::FeedbackTimeout {
                            session_id: session_id.to_string(),
                        });
                    }
                    SessionStatus::Pending => {}
                },
                None => {
                    return Err(AppError::FeedbackTimeout {
                        session_id: session_id.to_string(),
                    });
                }
            }

            if tokio::time::Instant::now() >= deadline {
                warn!("gave up waiting for answers on session {session_id}");
                return Err(AppError::FeedbackTimeout {
                    session_id: session_id.to_string(),
                });
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
