//! Pipeline orchestrator: stage sequencing, checkpointing after every
//! transition, and the status view clients poll.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::capability::StructuredOutputCapability;
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::job::JobPostingDraft;
use crate::models::session::SessionKind;
use crate::models::workflow::{StageMetadata, WorkflowState, WorkflowStatus};
use crate::pipeline::{consolidate, draft, retrieval, structure, validators};
use crate::reference::ReferenceStore;
use crate::sessions::SessionRegistry;

// ────────────────────────────────────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────────────────────────────────────

/// Knobs for the human-in-the-loop machinery, loaded from the environment in
/// production and overridden freely in tests.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_feedback_cycles: u32,
    pub poll_interval: Duration,
    pub session_ttl: Duration,
    pub wait_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        PipelineSettings {
            max_feedback_cycles: config.max_feedback_cycles,
            poll_interval: Duration::from_secs(config.feedback_poll_interval_secs),
            session_ttl: Duration::from_secs(config.feedback_session_ttl_secs),
            wait_timeout: Duration::from_secs(config.feedback_wait_timeout_secs),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            max_feedback_cycles: 5,
            poll_interval: Duration::from_secs(2),
            session_ttl: Duration::from_secs(300),
            wait_timeout: Duration::from_secs(600),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

pub struct PipelineOrchestrator {
    capability: Arc<StructuredOutputCapability>,
    reference: Arc<dyn ReferenceStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    sessions: Arc<SessionRegistry>,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        capability: Arc<StructuredOutputCapability>,
        reference: Arc<dyn ReferenceStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        sessions: Arc<SessionRegistry>,
        settings: PipelineSettings,
    ) -> Self {
        PipelineOrchestrator {
            capability,
            reference,
            checkpoints,
            sessions,
            settings,
        }
    }

    /// Rejects a second start for a workflow id that is still in flight.
    /// Terminal workflows may be re-run under the same id.
    pub async fn ensure_startable(&self, workflow_id: &str) -> Result<(), AppError> {
        if let Some(existing) = self.checkpoints.load(workflow_id).await? {
            match existing.status {
                WorkflowStatus::Initialized | WorkflowStatus::Running => {
                    return Err(AppError::Conflict(format!(
                        "Workflow {workflow_id} is already running"
                    )));
                }
                WorkflowStatus::Completed | WorkflowStatus::Error => {}
            }
        }
        Ok(())
    }

    /// Runs the pipeline in the background. Callers poll the status endpoint
    /// for progress; nothing is awaited here.
    pub fn start(self: &Arc<Self>, workflow_id: String, raw_text: String) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let state = orchestrator.run_pipeline(workflow_id, raw_text).await;
            match state.status {
                WorkflowStatus::Completed => {
                    info!(
                        "workflow {} completed in {} steps",
                        state.workflow_id, state.step_count
                    );
                }
                _ => {
                    warn!(
                        "workflow {} ended as {} ({} errors)",
                        state.workflow_id,
                        state.status.as_str(),
                        state.errors.len()
                    );
                }
            }
        });
    }

    /// The six stages in order, fail-fast between them. Every stage owns its
    /// internal degrade decisions; a stage that records an error stops the
    /// run at the next check.
    async fn run_pipeline(&self, workflow_id: String, raw_text: String) -> WorkflowState {
        let mut state = WorkflowState::new(workflow_id, raw_text);
        state.status = WorkflowStatus::Running;
        self.save(&state).await;

        state = structure::structure_input(state, &self.capability).await;
        self.save(&state).await;
        if state.status == WorkflowStatus::Error {
            return state;
        }

        state = validators::validate_sensitivity(
            state,
            Arc::clone(&self.capability),
            &self.sessions,
            self.checkpoints.as_ref(),
            &self.settings,
        )
        .await;
        self.save(&state).await;
        if state.status == WorkflowStatus::Error {
            return state;
        }

        state = retrieval::retrieve_reference_data(state, self.reference.as_ref()).await;
        self.save(&state).await;
        if state.status == WorkflowStatus::Error {
            return state;
        }

        state = consolidate::consolidate(state);
        self.save(&state).await;
        if state.status == WorkflowStatus::Error {
            return state;
        }

        state = draft::generate_draft(state, &self.capability).await;
        self.save(&state).await;
        if state.status == WorkflowStatus::Error {
            return state;
        }

        state = validators::validate_consistency(
            state,
            Arc::clone(&self.capability),
            &self.sessions,
            self.checkpoints.as_ref(),
            &self.settings,
        )
        .await;
        self.save(&state).await;
        if state.status == WorkflowStatus::Error {
            return state;
        }

        if state.draft.is_some() {
            state.complete();
        } else {
            state.record_error(
                "finalize",
                &AppError::Generation("pipeline finished without a draft".to_string()),
            );
        }
        self.save(&state).await;
        state
    }

    /// Checkpoint failures are logged, never fatal.
    async fn save(&self, state: &WorkflowState) {
        if let Err(e) = self.checkpoints.save(&state.workflow_id, state).await {
            warn!("checkpoint save failed for {}: {e}", state.workflow_id);
        }
    }

    /// Status view from the latest checkpoint. An id with no checkpoint is
    /// reported as `not_found` rather than an error.
    pub async fn get_status(&self, workflow_id: &str) -> Result<StatusReport, AppError> {
        match self.checkpoints.load(workflow_id).await? {
            Some(state) => Ok(StatusReport::from_state(&state)),
            None => Ok(StatusReport::not_found(workflow_id)),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Status view
// ────────────────────────────────────────────────────────────────────────────

/// Client-facing projection of a workflow checkpoint.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub workflow_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub step_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<JobPostingDraft>,
    pub stage_metadata: BTreeMap<String, StageMetadata>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_feedback: Option<PendingFeedbackView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Pending questions without the suspension token; the token is runtime
/// state, not client data.
#[derive(Debug, Serialize)]
pub struct PendingFeedbackView {
    pub session_id: String,
    pub kind: SessionKind,
    pub questions: Vec<String>,
}

impl StatusReport {
    fn from_state(state: &WorkflowState) -> Self {
        StatusReport {
            workflow_id: state.workflow_id.clone(),
            status: state.status.as_str().to_string(),
            current_step: Some(state.current_step.clone()),
            step_count: state.step_count,
            draft: state.draft.clone(),
            stage_metadata: state.stage_metadata.clone(),
            errors: state.errors.clone(),
            warnings: state.warnings.clone(),
            pending_feedback: state.pending_feedback.as_ref().map(|p| PendingFeedbackView {
                session_id: p.session_id.clone(),
                kind: p.kind,
                questions: p.questions.clone(),
            }),
            updated_at: Some(state.updated_at),
        }
    }

    fn not_found(workflow_id: &str) -> Self {
        StatusReport {
            workflow_id: workflow_id.to_string(),
            status: "not_found".to_string(),
            current_step: None,
            step_count: 0,
            draft: None,
            stage_metadata: BTreeMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            pending_feedback: None,
            updated_at: None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
