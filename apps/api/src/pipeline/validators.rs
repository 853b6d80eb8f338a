//! Stages 2 and 6: model-backed review with a human in the loop.
//!
//! Both validators share one driver: run the validation agent over a
//! subject, and whenever it suspends, open a feedback session, checkpoint
//! the parked workflow and poll for answers. A review that cannot finish
//! (providers down, cycle bound hit, nobody answered) degrades
//! conservatively: the subject is kept unchanged and the workflow continues.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};

use crate::agent::{AgentOutcome, SuspensionToken, ValidationAgent};
use crate::capability::StructuredOutputCapability;
use crate::checkpoint::CheckpointStore;
use crate::errors::AppError;
use crate::models::job::{JobPostingDraft, JobRequest};
use crate::models::session::SessionKind;
use crate::models::workflow::{PendingFeedback, Provenance, StageMetadata, WorkflowState};
use crate::pipeline::orchestrator::PipelineSettings;
use crate::pipeline::prompts;
use crate::sessions::{CreateSession, SessionRegistry};

// ────────────────────────────────────────────────────────────────────────────
// Stage entry points
// ────────────────────────────────────────────────────────────────────────────

/// Stage 2: review the structured requisition for discriminatory or legally
/// risky content. Findings are routed to a human; their answers decide what
/// changes.
pub async fn validate_sensitivity(
    mut state: WorkflowState,
    capability: Arc<StructuredOutputCapability>,
    sessions: &Arc<SessionRegistry>,
    checkpoints: &dyn CheckpointStore,
    settings: &PipelineSettings,
) -> WorkflowState {
    state.advance("sensitivity_validation");

    let Some(request) = state.structured_request.clone() else {
        state.record_error(
            "sensitivity_validation",
            &AppError::Validation("no structured request to review".to_string()),
        );
        return state;
    };

    let revised: Option<JobRequest> = drive_review(
        &mut state,
        "sensitivity_validation",
        SessionKind::Sensitivity,
        prompts::SENSITIVITY_SYSTEM,
        &request,
        capability,
        sessions,
        checkpoints,
        settings,
    )
    .await;

    if let Some(revised) = revised {
        info!(
            "workflow {} requisition revised by sensitivity review",
            state.workflow_id
        );
        state.structured_request = Some(revised);
    }
    state
}

/// What the consistency reviewer sees: the draft plus the provenance it must
/// judge the draft against.
#[derive(Serialize)]
struct ConsistencySubject {
    draft: JobPostingDraft,
    provenance: Option<Provenance>,
}

/// Stage 6: review the draft for internal contradictions and for company
/// claims the provenance cannot back.
pub async fn validate_consistency(
    mut state: WorkflowState,
    capability: Arc<StructuredOutputCapability>,
    sessions: &Arc<SessionRegistry>,
    checkpoints: &dyn CheckpointStore,
    settings: &PipelineSettings,
) -> WorkflowState {
    state.advance("consistency_validation");

    let Some(draft) = state.draft.clone() else {
        state.record_error(
            "consistency_validation",
            &AppError::Validation("no draft to review".to_string()),
        );
        return state;
    };

    let subject = ConsistencySubject {
        draft,
        provenance: state.provenance.clone(),
    };

    let revised: Option<JobPostingDraft> = drive_review(
        &mut state,
        "consistency_validation",
        SessionKind::Consistency,
        prompts::CONSISTENCY_SYSTEM,
        &subject,
        capability,
        sessions,
        checkpoints,
        settings,
    )
    .await;

    if let Some(revised) = revised {
        info!(
            "workflow {} draft revised by consistency review",
            state.workflow_id
        );
        state.draft = Some(revised);
    }
    state
}

// ────────────────────────────────────────────────────────────────────────────
// Shared review driver
// ────────────────────────────────────────────────────────────────────────────

/// Runs one agent review to completion, suspending and resuming through the
/// session registry as needed. Returns the revised subject when the review
/// changed it; all bookkeeping (stage metadata, warnings, errors) happens on
/// `state` directly.
#[allow(clippy::too_many_arguments)]
async fn drive_review<S, T>(
    state: &mut WorkflowState,
    stage: &'static str,
    kind: SessionKind,
    system: &'static str,
    subject: &S,
    capability: Arc<StructuredOutputCapability>,
    sessions: &Arc<SessionRegistry>,
    checkpoints: &dyn CheckpointStore,
    settings: &PipelineSettings,
) -> Option<T>
where
    S: Serialize,
    T: DeserializeOwned,
{
    let agent = ValidationAgent::new(capability, system, settings.max_feedback_cycles);
    let thread_id = format!("{}_{}", state.workflow_id, kind.as_str());

    let mut outcome: AgentOutcome<T> = match agent.start(&thread_id, subject).await {
        Ok(outcome) => outcome,
        Err(e) => {
            state.record_error(stage, &e);
            return None;
        }
    };

    loop {
        match outcome {
            AgentOutcome::Completed { revised, reasoning } => {
                state.record_stage(
                    stage,
                    StageMetadata::with_reasoning("validation_agent", reasoning),
                );
                return revised;
            }
            AgentOutcome::Failed { reason } => {
                degrade(state, stage, reason);
                return None;
            }
            AgentOutcome::Suspended { token, questions } => {
                let answers = match suspend_for_answers(
                    state,
                    &token,
                    questions,
                    kind,
                    sessions,
                    checkpoints,
                    settings,
                )
                .await
                {
                    Ok(answers) => answers,
                    Err(reason) => {
                        degrade(state, stage, reason);
                        return None;
                    }
                };
                outcome = match agent.resume(token, answers).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        state.record_error(stage, &e);
                        return None;
                    }
                };
            }
        }
    }
}

/// Parks the workflow on a feedback session derived from the suspension
/// token, checkpoints it so the suspension survives a restart, then polls
/// until answers arrive or the wait is hopeless.
async fn suspend_for_answers(
    state: &mut WorkflowState,
    token: &SuspensionToken,
    questions: Vec<String>,
    kind: SessionKind,
    sessions: &Arc<SessionRegistry>,
    checkpoints: &dyn CheckpointStore,
    settings: &PipelineSettings,
) -> Result<Vec<String>, String> {
    let session = sessions
        .create(CreateSession {
            kind,
            questions: questions.clone(),
            ttl_seconds: Some(settings.session_ttl.as_secs()),
            session_id: Some(token.session_id()),
            workflow_id: Some(state.workflow_id.clone()),
        })
        .map_err(|e| format!("could not open feedback session: {e}"))?;

    state.pending_feedback = Some(PendingFeedback {
        session_id: session.session_id.clone(),
        kind,
        questions,
        token: token.clone(),
    });
    if let Err(e) = checkpoints.save(&state.workflow_id, state).await {
        warn!(
            "checkpoint save failed while suspending {}: {e}",
            state.workflow_id
        );
    }
    info!(
        "workflow {} suspended on session {} ({} questions, cycle {})",
        state.workflow_id,
        session.session_id,
        session.questions.len(),
        token.cycles()
    );

    let waited = sessions
        .wait_for_answers(
            &session.session_id,
            settings.poll_interval,
            settings.wait_timeout,
        )
        .await;

    state.pending_feedback = None;
    if let Err(e) = checkpoints.save(&state.workflow_id, state).await {
        warn!(
            "checkpoint save failed while resuming {}: {e}",
            state.workflow_id
        );
    }

    waited.map_err(|e| format!("no usable answers on session {}: {e}", session.session_id))
}

fn degrade(state: &mut WorkflowState, stage: &'static str, reason: String) {
    warn!("workflow {} {stage} degraded: {reason}", state.workflow_id);
    state.record_warning(
        stage,
        &format!("review skipped, subject kept unchanged: {reason}"),
    );
    state.record_stage(
        stage,
        StageMetadata::with_reasoning("conservative_degrade", reason),
    );
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Provider, ProviderError};
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::models::job::JobType;
    use crate::models::workflow::WorkflowStatus;
    use crate::sessions::SubmitOutcome;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    /// Flags the discriminatory requirement until the transcript carries a
    /// human answer, then applies it.
    struct FlaggedRequisitionReviewer;

    #[async_trait]
    impl Provider for FlaggedRequisitionReviewer {
        fn name(&self) -> &str {
            "flagged_reviewer"
        }

        async fn generate(&self, _system: &str, payload: &str) -> Result<Value, ProviderError> {
            if payload.contains("Human answers:") {
                Ok(json!({
                    "action": "final",
                    "revised": {
                        "company_name": "ACME corp",
                        "job_title": "Backend Engineer",
                        "job_type": "full_time",
                        "requirements": ["5+ years of Rust"]
                    },
                    "reasoning": "removed the discriminatory requirement as instructed"
                }))
            } else {
                Ok(json!({
                    "action": "request_human_input",
                    "questions": ["The requirement 'only male applicants' is discriminatory. Remove or rephrase?"]
                }))
            }
        }
    }

    /// Never reaches a verdict; asks the same question forever.
    struct AlwaysFlags;

    #[async_trait]
    impl Provider for AlwaysFlags {
        fn name(&self) -> &str {
            "always_flags"
        }

        async fn generate(&self, _system: &str, _payload: &str) -> Result<Value, ProviderError> {
            Ok(json!({
                "action": "request_human_input",
                "questions": ["Is this requirement acceptable?"]
            }))
        }
    }

    /// Finds nothing wrong.
    struct NoConcerns;

    #[async_trait]
    impl Provider for NoConcerns {
        fn name(&self) -> &str {
            "no_concerns"
        }

        async fn generate(&self, _system: &str, _payload: &str) -> Result<Value, ProviderError> {
            Ok(json!({"action": "final", "revised": null, "reasoning": "no concerns"}))
        }
    }

    /// Rewrites the draft title without asking anyone.
    struct TitleFixer;

    #[async_trait]
    impl Provider for TitleFixer {
        fn name(&self) -> &str {
            "title_fixer"
        }

        async fn generate(&self, _system: &str, _payload: &str) -> Result<Value, ProviderError> {
            Ok(json!({
                "action": "final",
                "revised": {
                    "title": "Backend Engineer at ACME corp",
                    "company_name": "ACME corp",
                    "company_introduction": "ACME corp is hiring.",
                    "responsibilities": ["Build services"],
                    "requirements": ["Rust"],
                    "preferred_qualifications": [],
                    "benefits": [],
                    "location": null,
                    "salary_range": null,
                    "application_notice": null
                },
                "reasoning": "title contradicted the body"
            }))
        }
    }

    fn make_capability(provider: Arc<dyn Provider>) -> Arc<StructuredOutputCapability> {
        Arc::new(StructuredOutputCapability::new(vec![provider]))
    }

    fn make_state_with_request(workflow_id: &str) -> WorkflowState {
        let mut state = WorkflowState::new(workflow_id, "notes");
        state.structured_request = Some(JobRequest {
            company_name: "ACME corp".to_string(),
            job_title: "Backend Engineer".to_string(),
            job_type: JobType::FullTime,
            experience_level: None,
            requirements: vec![
                "5+ years of Rust".to_string(),
                "only male applicants".to_string(),
            ],
            preferred_qualifications: Vec::new(),
            benefits: Vec::new(),
            location: None,
            salary_range: None,
        });
        state
    }

    fn make_draft() -> JobPostingDraft {
        JobPostingDraft {
            title: "Frontend Engineer at ACME corp".to_string(),
            company_name: "ACME corp".to_string(),
            company_introduction: "ACME corp is hiring.".to_string(),
            responsibilities: vec!["Build services".to_string()],
            requirements: vec!["Rust".to_string()],
            preferred_qualifications: Vec::new(),
            benefits: Vec::new(),
            location: None,
            salary_range: None,
            application_notice: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flagged_requisition_waits_for_reviewer_and_applies_answer() {
        let capability = make_capability(Arc::new(FlaggedRequisitionReviewer));
        let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(300)));
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let settings = PipelineSettings::default();
        let state = make_state_with_request("wf_hitl");

        let reviewer_sessions = Arc::clone(&sessions);
        let reviewer_checkpoints = Arc::clone(&checkpoints);
        let reviewer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            // by now the workflow is parked and its checkpoint shows it
            let parked = reviewer_checkpoints
                .load("wf_hitl")
                .await
                .unwrap()
                .expect("suspended workflow must be checkpointed");
            let pending = parked
                .pending_feedback
                .expect("checkpoint must carry the pending session");
            assert_eq!(pending.session_id, "wf_hitl_sensitivity_fb1");
            assert_eq!(pending.kind, SessionKind::Sensitivity);
            assert_eq!(pending.questions.len(), 1);

            let outcome = reviewer_sessions
                .submit(&pending.session_id, vec!["remove this line".to_string()]);
            assert!(matches!(outcome, SubmitOutcome::Accepted(_)));
        });

        let state = validate_sensitivity(
            state,
            capability,
            &sessions,
            checkpoints.as_ref(),
            &settings,
        )
        .await;
        reviewer.await.unwrap();

        let request = state.structured_request.unwrap();
        assert_eq!(request.requirements, vec!["5+ years of Rust".to_string()]);
        assert!(state.pending_feedback.is_none());
        assert_ne!(state.status, WorkflowStatus::Error);
        assert_eq!(
            state.stage_metadata["sensitivity_validation"].generated_by,
            "validation_agent"
        );

        // the session record keeps the full exchange
        let session = sessions.get("wf_hitl_sensitivity_fb1").unwrap();
        assert_eq!(session.workflow_id, Some("wf_hitl".to_string()));
        assert_eq!(session.answers, Some(vec!["remove this line".to_string()]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_session_degrades_conservatively() {
        let capability = make_capability(Arc::new(AlwaysFlags));
        let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(300)));
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let settings = PipelineSettings {
            session_ttl: Duration::from_secs(4),
            ..PipelineSettings::default()
        };
        let state = make_state_with_request("wf_silent");

        let state = validate_sensitivity(
            state,
            capability,
            &sessions,
            checkpoints.as_ref(),
            &settings,
        )
        .await;

        // nobody answered: requisition unchanged, flagged line included
        let request = state.structured_request.unwrap();
        assert!(request
            .requirements
            .contains(&"only male applicants".to_string()));
        assert_ne!(state.status, WorkflowStatus::Error);
        assert!(state.pending_feedback.is_none());
        assert_eq!(
            state.stage_metadata["sensitivity_validation"].generated_by,
            "conservative_degrade"
        );
        assert!(state
            .warnings
            .iter()
            .any(|w| w.starts_with("sensitivity_validation:")));
    }

    #[tokio::test]
    async fn test_clean_requisition_passes_unchanged() {
        let capability = make_capability(Arc::new(NoConcerns));
        let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(300)));
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let settings = PipelineSettings::default();
        let state = make_state_with_request("wf_clean");
        let request_before = state.structured_request.clone();

        let state = validate_sensitivity(
            state,
            capability,
            &sessions,
            checkpoints.as_ref(),
            &settings,
        )
        .await;

        assert_eq!(state.structured_request, request_before);
        assert_ne!(state.status, WorkflowStatus::Error);
        assert_eq!(
            state.stage_metadata["sensitivity_validation"]
                .reasoning
                .as_deref(),
            Some("no concerns")
        );
        assert!(sessions.list().is_empty());
    }

    #[tokio::test]
    async fn test_consistency_review_replaces_draft() {
        let capability = make_capability(Arc::new(TitleFixer));
        let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(300)));
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let settings = PipelineSettings::default();

        let mut state = WorkflowState::new("wf_draft", "notes");
        state.draft = Some(make_draft());

        let state = validate_consistency(
            state,
            capability,
            &sessions,
            checkpoints.as_ref(),
            &settings,
        )
        .await;

        let draft = state.draft.unwrap();
        assert_eq!(draft.title, "Backend Engineer at ACME corp");
        assert_eq!(
            state.stage_metadata["consistency_validation"].generated_by,
            "validation_agent"
        );
    }

    #[tokio::test]
    async fn test_missing_draft_is_an_error_for_consistency() {
        let capability = make_capability(Arc::new(NoConcerns));
        let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(300)));
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let settings = PipelineSettings::default();
        let state = WorkflowState::new("wf_nodraft", "notes");

        let state = validate_consistency(
            state,
            capability,
            &sessions,
            checkpoints.as_ref(),
            &settings,
        )
        .await;

        assert_eq!(state.status, WorkflowStatus::Error);
    }
}
