use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// The four pipeline taxa (Validation, Generation, FeedbackTimeout,
/// ReferenceData) are also what stage functions record into
/// `WorkflowState.errors`; [`AppError::kind`] supplies the stable code
/// used in both places.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Feedback session {session_id} expired or timed out")]
    FeedbackTimeout { session_id: String },

    #[error("Reference data error: {0}")]
    ReferenceData(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for this error, shared between HTTP
    /// response bodies and error strings recorded on workflow checkpoints.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Generation(_) => "GENERATION_ERROR",
            AppError::FeedbackTimeout { .. } => "FEEDBACK_TIMEOUT",
            AppError::ReferenceData(_) => "REFERENCE_DATA_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.kind();
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Generation(msg) => {
                tracing::error!("Generation error: {msg}");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::FeedbackTimeout { session_id } => {
                tracing::warn!("Feedback timeout for session {session_id}");
                (StatusCode::GATEWAY_TIMEOUT, self.to_string())
            }
            AppError::ReferenceData(msg) => {
                tracing::error!("Reference data error: {msg}");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_stable_per_variant() {
        assert_eq!(
            AppError::Validation("bad".to_string()).kind(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            AppError::Generation("all providers failed".to_string()).kind(),
            "GENERATION_ERROR"
        );
        assert_eq!(
            AppError::FeedbackTimeout {
                session_id: "wf_1_fb1".to_string()
            }
            .kind(),
            "FEEDBACK_TIMEOUT"
        );
        assert_eq!(
            AppError::ReferenceData("store down".to_string()).kind(),
            "REFERENCE_DATA_ERROR"
        );
    }

    #[test]
    fn test_feedback_timeout_message_names_session() {
        let err = AppError::FeedbackTimeout {
            session_id: "wf_9_fb2".to_string(),
        };
        assert!(err.to_string().contains("wf_9_fb2"));
    }
}
