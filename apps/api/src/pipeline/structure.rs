//! Stage 1: turn free-form hiring notes into a structured requisition.

use tracing::info;

use crate::capability::StructuredOutputCapability;
use crate::errors::AppError;
use crate::models::job::JobRequest;
use crate::models::workflow::{StageMetadata, WorkflowState};
use crate::pipeline::prompts;

/// Extracts a [`JobRequest`] from the raw requisition text.
///
/// Re-entrant: a checkpointed state that already carries a structured
/// request passes through untouched, with no model call.
pub async fn structure_input(
    mut state: WorkflowState,
    capability: &StructuredOutputCapability,
) -> WorkflowState {
    if state.structured_request.is_some() {
        return state;
    }

    state.advance("structure_input");

    let Some(raw_text) = state.raw_text.clone() else {
        state.record_error(
            "structure_input",
            &AppError::Validation("workflow has no requisition text".to_string()),
        );
        return state;
    };

    let payload = prompts::structure_payload(&raw_text);
    match capability
        .generate::<JobRequest>(prompts::STRUCTURE_SYSTEM, &payload)
        .await
    {
        Ok(request) => match postprocess(request) {
            Ok(request) => {
                info!(
                    "workflow {} structured: {} / {}",
                    state.workflow_id, request.company_name, request.job_title
                );
                state.structured_request = Some(request);
                state.record_stage("structure_input", StageMetadata::new("structured_output"));
            }
            Err(e) => state.record_error("structure_input", &e),
        },
        Err(e) => state.record_error("structure_input", &e),
    }

    state
}

/// Trims extracted fields and rejects requests missing the two anchors every
/// later stage depends on.
fn postprocess(mut request: JobRequest) -> Result<JobRequest, AppError> {
    request.company_name = request.company_name.trim().to_string();
    request.job_title = request.job_title.trim().to_string();
    request.experience_level = normalize_opt(request.experience_level);
    request.location = normalize_opt(request.location);
    request.salary_range = normalize_opt(request.salary_range);
    request.requirements = normalize_list(request.requirements);
    request.preferred_qualifications = normalize_list(request.preferred_qualifications);
    request.benefits = normalize_list(request.benefits);

    if request.company_name.is_empty() {
        return Err(AppError::Validation(
            "extraction produced no company name".to_string(),
        ));
    }
    if request.job_title.is_empty() {
        return Err(AppError::Validation(
            "extraction produced no job title".to_string(),
        ));
    }

    Ok(request)
}

fn normalize_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Provider, ProviderError};
    use crate::models::job::JobType;
    use crate::models::workflow::WorkflowStatus;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        response: Option<Value>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, _system: &str, _payload: &str) -> Result<Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Some(value) => Ok(value.clone()),
                None => Err(ProviderError::EmptyContent),
            }
        }
    }

    fn make_capability(
        response: Option<Value>,
        calls: Arc<AtomicUsize>,
    ) -> StructuredOutputCapability {
        StructuredOutputCapability::new(vec![Arc::new(StubProvider { response, calls })])
    }

    #[tokio::test]
    async fn test_structures_raw_text() {
        let capability = make_capability(
            Some(json!({
                "company_name": "ACME corp",
                "job_title": "Backend Engineer",
                "job_type": "Full-Time",
                "requirements": ["Rust"]
            })),
            Arc::new(AtomicUsize::new(0)),
        );
        let state = WorkflowState::new("wf_1", "ACME corp needs a backend engineer");

        let state = structure_input(state, &capability).await;

        let request = state.structured_request.unwrap();
        assert_eq!(request.company_name, "ACME corp");
        assert_eq!(request.job_type, JobType::FullTime);
        assert_ne!(state.status, WorkflowStatus::Error);
        assert_eq!(
            state.stage_metadata["structure_input"].generated_by,
            "structured_output"
        );
    }

    #[tokio::test]
    async fn test_already_structured_state_passes_through_untouched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let capability = make_capability(Some(json!({})), calls.clone());

        let mut state = WorkflowState::new("wf_1", "notes");
        state.structured_request = Some(JobRequest {
            company_name: "ACME corp".to_string(),
            job_title: "Backend Engineer".to_string(),
            job_type: JobType::FullTime,
            experience_level: None,
            requirements: Vec::new(),
            preferred_qualifications: Vec::new(),
            benefits: Vec::new(),
            location: None,
            salary_range: None,
        });
        let before = state.clone();

        let after = structure_input(state, &capability).await;

        assert_eq!(after, before);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_raw_text_is_a_validation_error() {
        let capability = make_capability(Some(json!({})), Arc::new(AtomicUsize::new(0)));
        let mut state = WorkflowState::new("wf_1", "notes");
        state.raw_text = None;

        let state = structure_input(state, &capability).await;

        assert_eq!(state.status, WorkflowStatus::Error);
        assert!(state.errors[0].contains("VALIDATION_ERROR"));
    }

    #[tokio::test]
    async fn test_extraction_without_company_name_is_rejected() {
        let capability = make_capability(
            Some(json!({"company_name": "  ", "job_title": "Backend Engineer"})),
            Arc::new(AtomicUsize::new(0)),
        );
        let state = WorkflowState::new("wf_1", "notes");

        let state = structure_input(state, &capability).await;

        assert_eq!(state.status, WorkflowStatus::Error);
        assert!(state.errors[0].contains("no company name"));
    }

    #[tokio::test]
    async fn test_provider_failure_records_generation_error() {
        let capability = make_capability(None, Arc::new(AtomicUsize::new(0)));
        let state = WorkflowState::new("wf_1", "notes");

        let state = structure_input(state, &capability).await;

        assert_eq!(state.status, WorkflowStatus::Error);
        assert!(state.errors[0].contains("GENERATION_ERROR"));
        assert!(state.structured_request.is_none());
    }

    #[test]
    fn test_postprocess_trims_and_drops_empty_items() {
        let request = postprocess(JobRequest {
            company_name: " ACME corp ".to_string(),
            job_title: " Backend Engineer ".to_string(),
            job_type: JobType::FullTime,
            experience_level: Some("  ".to_string()),
            requirements: vec![" Rust ".to_string(), "".to_string()],
            preferred_qualifications: Vec::new(),
            benefits: Vec::new(),
            location: Some(" Berlin ".to_string()),
            salary_range: None,
        })
        .unwrap();

        assert_eq!(request.company_name, "ACME corp");
        assert_eq!(request.experience_level, None);
        assert_eq!(request.requirements, vec!["Rust".to_string()]);
        assert_eq!(request.location, Some("Berlin".to_string()));
    }
}
