//! Axum route handlers for the Postings API.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capability::ProviderUsage;
use crate::errors::AppError;
use crate::pipeline::orchestrator::StatusReport;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartPostingRequest {
    pub raw_text: String,
    #[serde(default)]
    pub workflow_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartPostingResponse {
    pub workflow_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct UsageStatsResponse {
    pub providers: BTreeMap<String, ProviderUsage>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/postings
///
/// Accepts a free-form requisition and starts the pipeline in the
/// background. Returns 202 immediately; poll the status endpoint for
/// progress.
pub async fn handle_start_posting(
    State(state): State<AppState>,
    Json(request): Json<StartPostingRequest>,
) -> Result<(StatusCode, Json<StartPostingResponse>), AppError> {
    if request.raw_text.trim().is_empty() {
        return Err(AppError::Validation("raw_text cannot be empty".to_string()));
    }

    let workflow_id = request
        .workflow_id
        .unwrap_or_else(|| format!("wf_{}", Uuid::new_v4().simple()));

    state.orchestrator.ensure_startable(&workflow_id).await?;
    state
        .orchestrator
        .start(workflow_id.clone(), request.raw_text);

    Ok((
        StatusCode::ACCEPTED,
        Json(StartPostingResponse {
            workflow_id,
            status: "accepted".to_string(),
        }),
    ))
}

/// GET /api/v1/postings/:workflow_id/status
///
/// Latest checkpointed view of the workflow, including pending feedback
/// questions while it is suspended.
pub async fn handle_posting_status(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<StatusReport>, AppError> {
    let report = state.orchestrator.get_status(&workflow_id).await?;
    Ok(Json(report))
}

/// GET /api/v1/postings/stats
///
/// Per-provider call counters.
pub async fn handle_usage_stats(State(state): State<AppState>) -> Json<UsageStatsResponse> {
    Json(UsageStatsResponse {
        providers: state.capability.usage_snapshot(),
    })
}
