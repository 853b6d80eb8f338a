//! Axum route handlers for the Feedback Sessions API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::session::FeedbackSession;
use crate::sessions::{CreateSession, SubmitOutcome};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<FeedbackSession>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
///
/// Opens a standalone feedback session. Workflow suspensions create theirs
/// internally; this endpoint exists for tooling and manual review flows.
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSession>,
) -> Result<(StatusCode, Json<FeedbackSession>), AppError> {
    if request.questions.is_empty() {
        return Err(AppError::Validation(
            "questions cannot be empty".to_string(),
        ));
    }

    let session = state.sessions.create(request)?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/sessions
///
/// Lists all sessions, newest first.
pub async fn handle_list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionListResponse>, AppError> {
    let sessions = state.sessions.list();
    let count = sessions.len();

    Ok(Json(SessionListResponse { sessions, count }))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<FeedbackSession>, AppError> {
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("Feedback session {session_id} not found")))?;

    Ok(Json(session))
}

/// POST /api/v1/sessions/:id/submit
///
/// Records human answers. The suspended workflow picks them up on its next
/// poll.
pub async fn handle_submit_answers(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SubmitAnswersRequest>,
) -> Result<Json<FeedbackSession>, AppError> {
    match state.sessions.submit(&session_id, request.answers) {
        SubmitOutcome::Accepted(session) => Ok(Json(session)),
        SubmitOutcome::NotFound => Err(AppError::NotFound(format!(
            "Feedback session {session_id} not found"
        ))),
        SubmitOutcome::AlreadyTerminal(status) => Err(AppError::Conflict(format!(
            "Feedback session {session_id} is already {}",
            status.as_str()
        ))),
        SubmitOutcome::AnswerCountMismatch { expected, received } => {
            Err(AppError::Validation(format!(
                "expected {expected} answers, received {received}"
            )))
        }
    }
}

/// POST /api/v1/sessions/:id/cancel
pub async fn handle_cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<FeedbackSession>, AppError> {
    match state.sessions.cancel(&session_id) {
        SubmitOutcome::Accepted(session) => Ok(Json(session)),
        SubmitOutcome::NotFound => Err(AppError::NotFound(format!(
            "Feedback session {session_id} not found"
        ))),
        SubmitOutcome::AlreadyTerminal(status) => Err(AppError::Conflict(format!(
            "Feedback session {session_id} is already {}",
            status.as_str()
        ))),
        // cancel never reports a count mismatch; keep the match total anyway
        SubmitOutcome::AnswerCountMismatch { .. } => Err(AppError::Internal(anyhow::anyhow!(
            "unexpected outcome cancelling session {session_id}"
        ))),
    }
}
