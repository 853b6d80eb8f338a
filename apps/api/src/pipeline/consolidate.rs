//! Stage 4: merge the validated requisition with the retrieved company facts
//! and run cheap structural checks. Check failures become warnings, never
//! stage failures.

use crate::errors::AppError;
use crate::models::company::CompanyDetail;
use crate::models::job::{CompanyFacts, ConsolidatedInput, JobRequest, ValidationCheck};
use crate::models::workflow::{StageMetadata, WorkflowState};

pub fn consolidate(mut state: WorkflowState) -> WorkflowState {
    state.advance("consolidation");

    let Some(request) = state.structured_request.clone() else {
        state.record_error(
            "consolidation",
            &AppError::Validation("no structured request to consolidate".to_string()),
        );
        return state;
    };

    let input = build_consolidated(&request, state.reference_data.as_ref());
    let checks = run_structural_checks(&input);

    for check in &checks {
        if !check.passed {
            state.record_warning("consolidation", &check.message);
        }
    }

    let summary = checks
        .iter()
        .map(|c| format!("{}={}", c.name, if c.passed { "passed" } else { "failed" }))
        .collect::<Vec<_>>()
        .join(", ");

    state.consolidated_input = Some(input);
    state.record_stage(
        "consolidation",
        StageMetadata::with_reasoning("merge", format!("checks: {summary}")),
    );
    state
}

/// Store facts win over user-supplied ones where both exist; in particular
/// the canonical company name from the store replaces whatever spelling the
/// requisition used.
fn build_consolidated(request: &JobRequest, detail: Option<&CompanyDetail>) -> ConsolidatedInput {
    let company = match detail {
        Some(detail) => CompanyFacts {
            name: detail.name.clone(),
            industry: detail.industry.clone(),
            location: detail.location.clone(),
            employee_count: detail.employee_count,
            founded_year: detail.founded_year,
            website: detail.website.clone(),
            description: detail.description.clone(),
        },
        None => CompanyFacts::name_only(request.company_name.clone()),
    };

    ConsolidatedInput {
        company,
        job_title: request.job_title.clone(),
        job_type: request.job_type,
        experience_level: request.experience_level.clone(),
        requirements: request.requirements.clone(),
        preferred_qualifications: request.preferred_qualifications.clone(),
        benefits: request.benefits.clone(),
        location: request.location.clone(),
        salary_range: request.salary_range.clone(),
    }
}

fn run_structural_checks(input: &ConsolidatedInput) -> Vec<ValidationCheck> {
    let title_present = !input.job_title.trim().is_empty();
    let name_present = !input.company.name.trim().is_empty();
    let has_requirements = !input.requirements.is_empty();

    vec![
        ValidationCheck {
            name: "job_title_present".to_string(),
            passed: title_present,
            message: if title_present {
                "job title is present".to_string()
            } else {
                "job title is missing".to_string()
            },
        },
        ValidationCheck {
            name: "company_name_present".to_string(),
            passed: name_present,
            message: if name_present {
                "company name is present".to_string()
            } else {
                "company name is missing".to_string()
            },
        },
        ValidationCheck {
            name: "has_requirements".to_string(),
            passed: has_requirements,
            message: if has_requirements {
                "requirements list is populated".to_string()
            } else {
                "requirements list is empty".to_string()
            },
        },
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
