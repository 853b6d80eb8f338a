pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers as posting_handlers;
use crate::sessions::handlers as session_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Postings API
        .route(
            "/api/v1/postings",
            post(posting_handlers::handle_start_posting),
        )
        .route(
            "/api/v1/postings/stats",
            get(posting_handlers::handle_usage_stats),
        )
        .route(
            "/api/v1/postings/:workflow_id/status",
            get(posting_handlers::handle_posting_status),
        )
        // Feedback Sessions API
        .route(
            "/api/v1/sessions",
            post(session_handlers::handle_create_session)
                .get(session_handlers::handle_list_sessions),
        )
        .route(
            "/api/v1/sessions/:id",
            get(session_handlers::handle_get_session),
        )
        .route(
            "/api/v1/sessions/:id/submit",
            post(session_handlers::handle_submit_answers),
        )
        .route(
            "/api/v1/sessions/:id/cancel",
            post(session_handlers::handle_cancel_session),
        )
        .with_state(state)
}
