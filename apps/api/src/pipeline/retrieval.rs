//! Stage 3: ground the requisition in the company reference store and score
//! how complete that grounding is.
//!
//! This stage never fails the workflow. The three outcomes (match, no match,
//! store error) differ only in the provenance they attach, and every later
//! stage reads trust from that provenance.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::company::CompanyDetail;
use crate::models::workflow::{
    FieldSource, Provenance, ReliabilityIndicators, StageMetadata, WorkflowState,
};
use crate::reference::ReferenceStore;

pub async fn retrieve_reference_data(
    mut state: WorkflowState,
    reference: &dyn ReferenceStore,
) -> WorkflowState {
    state.advance("reference_retrieval");

    let Some(request) = state.structured_request.as_ref() else {
        state.record_error(
            "reference_retrieval",
            &AppError::Validation("no structured request to ground".to_string()),
        );
        return state;
    };
    let company_name = request.company_name.clone();

    match lookup_detail(reference, &company_name).await {
        Ok(Some(detail)) => {
            let provenance = provenance_from_store(&detail);
            info!(
                "workflow {} matched reference company {} (completeness {:.1})",
                state.workflow_id, detail.name, provenance.completeness_score
            );
            state.reference_data = Some(detail);
            state.provenance = Some(provenance);
        }
        Ok(None) => {
            info!(
                "workflow {} found no reference match for {company_name}",
                state.workflow_id
            );
            state.provenance = Some(provenance_user_only());
        }
        Err(e) => {
            warn!(
                "workflow {} reference lookup failed: {e}",
                state.workflow_id
            );
            state.record_warning("reference_retrieval", &format!("store lookup failed: {e}"));
            state.provenance = Some(provenance_store_error());
        }
    }

    state.record_stage("reference_retrieval", StageMetadata::new("reference_store"));
    state
}

async fn lookup_detail(
    reference: &dyn ReferenceStore,
    name: &str,
) -> Result<Option<CompanyDetail>, AppError> {
    let Some(summary) = reference.search(name).await? else {
        return Ok(None);
    };
    reference.get_detail(summary.id).await
}

/// Store hit: every retrieved fact is verified, and the score is the share
/// of optional fact fields the store actually had.
fn provenance_from_store(detail: &CompanyDetail) -> Provenance {
    let mut field_sources = BTreeMap::new();
    field_sources.insert("company_name".to_string(), FieldSource::Store);

    let mut filled = 0u32;
    for (field, present) in detail.optional_field_presence() {
        if present {
            field_sources.insert(field.to_string(), FieldSource::Store);
            filled += 1;
        }
    }

    Provenance {
        field_sources,
        completeness_score: f64::from(filled) / CompanyDetail::OPTIONAL_FIELD_COUNT as f64 * 100.0,
        reliability_indicators: ReliabilityIndicators {
            database_source: true,
            ..Default::default()
        },
        flags: Vec::new(),
    }
}

/// No match: only the user-supplied name is known, so everything beyond it
/// is flagged as a hallucination risk for the consistency validator.
fn provenance_user_only() -> Provenance {
    let mut field_sources = BTreeMap::new();
    field_sources.insert("company_name".to_string(), FieldSource::UserSupplied);

    Provenance {
        field_sources,
        completeness_score: 10.0,
        reliability_indicators: ReliabilityIndicators {
            user_provided_only: true,
            verification_needed: true,
            potential_hallucination_risk: true,
            ..Default::default()
        },
        flags: vec![
            "no_database_match".to_string(),
            "company_name_only".to_string(),
            "high_hallucination_risk".to_string(),
        ],
    }
}

/// Store unreachable: even the "no match" answer is unconfirmed, which is
/// less information than a clean miss.
fn provenance_store_error() -> Provenance {
    let mut field_sources = BTreeMap::new();
    field_sources.insert("company_name".to_string(), FieldSource::Fallback);

    Provenance {
        field_sources,
        completeness_score: 5.0,
        reliability_indicators: ReliabilityIndicators {
            database_error: true,
            fallback_mode: true,
            high_uncertainty: true,
            ..Default::default()
        },
        flags: Vec::new(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
