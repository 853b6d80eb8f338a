//! Workflow execution state: the single mutable record threaded through
//! every pipeline stage and persisted in the checkpoint store after each
//! transition.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::SuspensionToken;
use crate::errors::AppError;
use crate::models::company::CompanyDetail;
use crate::models::job::{ConsolidatedInput, JobPostingDraft, JobRequest};
use crate::models::session::SessionKind;

// ────────────────────────────────────────────────────────────────────────────
// Status & metadata
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initialized,
    Running,
    Completed,
    Error,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Initialized => "initialized",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Error => "error",
        }
    }
}

/// Record written by each stage under its own key in `stage_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetadata {
    pub generated_by: String,
    pub generation_time: DateTime<Utc>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl StageMetadata {
    pub fn new(generated_by: impl Into<String>) -> Self {
        StageMetadata {
            generated_by: generated_by.into(),
            generation_time: Utc::now(),
            reasoning: None,
        }
    }

    pub fn with_reasoning(generated_by: impl Into<String>, reasoning: impl Into<String>) -> Self {
        StageMetadata {
            generated_by: generated_by.into(),
            generation_time: Utc::now(),
            reasoning: Some(reasoning.into()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provenance: produced only by the retrieval stage
// ────────────────────────────────────────────────────────────────────────────

/// Where a retrieved fact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Store,
    UserSupplied,
    Fallback,
}

/// Boolean reliability signals consumed by the consistency validator. All
/// default to false so old checkpoints deserialize cleanly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliabilityIndicators {
    pub database_source: bool,
    pub user_provided_only: bool,
    pub verification_needed: bool,
    pub potential_hallucination_risk: bool,
    pub database_error: bool,
    pub fallback_mode: bool,
    pub high_uncertainty: bool,
}

/// Per-fact source map plus a 0-100 completeness score. This is the only
/// signal the consistency validator has to tell an internally-inconsistent
/// draft from an unverifiable one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub field_sources: BTreeMap<String, FieldSource>,
    pub completeness_score: f64,
    pub reliability_indicators: ReliabilityIndicators,
    #[serde(default)]
    pub flags: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Suspension bookkeeping
// ────────────────────────────────────────────────────────────────────────────

/// Set while the workflow is parked on a feedback session. Carries the
/// suspension token so a process restart between suspend and resume loses
/// nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFeedback {
    pub session_id: String,
    pub kind: SessionKind,
    pub questions: Vec<String>,
    pub token: SuspensionToken,
}

// ────────────────────────────────────────────────────────────────────────────
// Workflow state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: String,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub structured_request: Option<JobRequest>,
    #[serde(default)]
    pub reference_data: Option<CompanyDetail>,
    #[serde(default)]
    pub provenance: Option<Provenance>,
    #[serde(default)]
    pub consolidated_input: Option<ConsolidatedInput>,
    #[serde(default)]
    pub draft: Option<JobPostingDraft>,
    #[serde(default)]
    pub stage_metadata: BTreeMap<String, StageMetadata>,
    #[serde(default)]
    pub pending_feedback: Option<PendingFeedback>,
    pub current_step: String,
    pub status: WorkflowStatus,
    pub step_count: u32,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(workflow_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let now = Utc::now();
        WorkflowState {
            workflow_id: workflow_id.into(),
            raw_text: Some(raw_text.into()),
            structured_request: None,
            reference_data: None,
            provenance: None,
            consolidated_input: None,
            draft: None,
            stage_metadata: BTreeMap::new(),
            pending_feedback: None,
            current_step: "initialized".to_string(),
            status: WorkflowStatus::Initialized,
            step_count: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks entry into a stage.
    pub fn advance(&mut self, step: &str) {
        self.current_step = step.to_string();
        self.step_count += 1;
        self.updated_at = Utc::now();
    }

    /// Records a stage's metadata. Append-only: an existing key is never
    /// overwritten, so no stage can clobber another stage's record.
    pub fn record_stage(&mut self, key: &str, metadata: StageMetadata) {
        self.stage_metadata
            .entry(key.to_string())
            .or_insert(metadata);
        self.updated_at = Utc::now();
    }

    /// Fail-fast recording: stores the taxonomy kind and message, flips the
    /// status to `Error`. The orchestrator stops at the next check.
    pub fn record_error(&mut self, stage: &str, error: &AppError) {
        self.errors
            .push(format!("{stage}: {}: {error}", error.kind()));
        self.status = WorkflowStatus::Error;
        self.updated_at = Utc::now();
    }

    /// Non-fatal note, e.g. a failed structural check or a degraded
    /// validator.
    pub fn record_warning(&mut self, stage: &str, message: &str) {
        self.warnings.push(format!("{stage}: {message}"));
        self.updated_at = Utc::now();
    }

    /// Terminal bookkeeping for a successful run.
    pub fn complete(&mut self) {
        self.status = WorkflowStatus::Completed;
        self.current_step = "completed".to_string();
        self.updated_at = Utc::now();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_initialized() {
        let state = WorkflowState::new("wf_1", "hire someone");
        assert_eq!(state.status, WorkflowStatus::Initialized);
        assert_eq!(state.current_step, "initialized");
        assert_eq!(state.step_count, 0);
        assert_eq!(state.raw_text.as_deref(), Some("hire someone"));
        assert!(state.draft.is_none());
    }

    #[test]
    fn test_advance_tracks_step_and_count() {
        let mut state = WorkflowState::new("wf_1", "text");
        state.advance("structure_input");
        state.advance("sensitivity_validation");
        assert_eq!(state.current_step, "sensitivity_validation");
        assert_eq!(state.step_count, 2);
    }

    #[test]
    fn test_record_stage_is_append_only() {
        let mut state = WorkflowState::new("wf_1", "text");
        state.record_stage("structure_input", StageMetadata::new("structured_output"));
        state.record_stage("structure_input", StageMetadata::new("something_else"));
        assert_eq!(
            state.stage_metadata["structure_input"].generated_by,
            "structured_output"
        );
        assert_eq!(state.stage_metadata.len(), 1);
    }

    #[test]
    fn test_record_error_flips_status_and_keeps_kind() {
        let mut state = WorkflowState::new("wf_1", "text");
        state.record_error(
            "draft_generation",
            &AppError::Generation("All providers failed".to_string()),
        );
        assert_eq!(state.status, WorkflowStatus::Error);
        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].contains("GENERATION_ERROR"));
        assert!(state.errors[0].starts_with("draft_generation:"));
    }

    #[test]
    fn test_record_warning_does_not_change_status() {
        let mut state = WorkflowState::new("wf_1", "text");
        state.status = WorkflowStatus::Running;
        state.record_warning("consolidation", "requirements list is empty");
        assert_eq!(state.status, WorkflowStatus::Running);
        assert_eq!(state.warnings.len(), 1);
    }

    #[test]
    fn test_reliability_indicators_default_false() {
        let indicators = ReliabilityIndicators::default();
        assert!(!indicators.database_source);
        assert!(!indicators.database_error);
        assert!(!indicators.potential_hallucination_risk);
    }

    #[test]
    fn test_state_survives_checkpoint_round_trip() {
        let mut state = WorkflowState::new("wf_1", "text");
        state.advance("structure_input");
        state.record_stage("structure_input", StageMetadata::new("structured_output"));
        let json = serde_json::to_string(&state).unwrap();
        let restored: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }
}
