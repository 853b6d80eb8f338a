//! Stage 5: generate the posting draft. This stage always leaves a draft on
//! the state: when every provider fails it falls back to a deterministic
//! template built from the consolidated input alone.

use tracing::warn;

use crate::capability::StructuredOutputCapability;
use crate::errors::AppError;
use crate::models::job::{ConsolidatedInput, JobPostingDraft};
use crate::models::workflow::{StageMetadata, WorkflowState};
use crate::pipeline::prompts;

pub async fn generate_draft(
    mut state: WorkflowState,
    capability: &StructuredOutputCapability,
) -> WorkflowState {
    state.advance("draft_generation");

    let Some(input) = state.consolidated_input.clone() else {
        state.record_error(
            "draft_generation",
            &AppError::Validation("no consolidated input to draft from".to_string()),
        );
        return state;
    };

    let payload = prompts::draft_payload(&input);
    match capability
        .generate::<JobPostingDraft>(prompts::DRAFT_SYSTEM, &payload)
        .await
    {
        Ok(mut draft) => {
            // company_name comes from the consolidated facts, never from the model
            draft.company_name = input.company.name.clone();
            state.draft = Some(draft);
            state.record_stage("draft_generation", StageMetadata::new("structured_output"));
        }
        Err(e) => {
            warn!(
                "workflow {} draft generation failed, using template: {e}",
                state.workflow_id
            );
            state.record_warning("draft_generation", &format!("generation failed: {e}"));
            state.draft = Some(template_draft(&input));
            state.record_stage(
                "draft_generation",
                StageMetadata::with_reasoning("template_fallback", e.to_string()),
            );
        }
    }

    state
}

/// Deterministic draft for the no-provider path. Plain wording, but
/// structurally complete, so the workflow still ends with a usable draft.
fn template_draft(input: &ConsolidatedInput) -> JobPostingDraft {
    let company = &input.company;
    let company_introduction = match (&company.description, &company.industry) {
        (Some(description), _) => description.clone(),
        (None, Some(industry)) => {
            format!("{} is a company in the {industry} industry.", company.name)
        }
        (None, None) => format!("{} is hiring.", company.name),
    };

    JobPostingDraft {
        title: format!("{} - {}", company.name, input.job_title),
        company_name: company.name.clone(),
        company_introduction,
        responsibilities: vec![format!(
            "Work as a {} ({})",
            input.job_title,
            input.job_type.as_str()
        )],
        requirements: input.requirements.clone(),
        preferred_qualifications: input.preferred_qualifications.clone(),
        benefits: input.benefits.clone(),
        location: input.location.clone(),
        salary_range: input.salary_range.clone(),
        application_notice: Some(
            "This posting was drafted automatically. Verify all details before publishing."
                .to_string(),
        ),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
