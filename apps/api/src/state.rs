use std::sync::Arc;

use crate::capability::StructuredOutputCapability;
use crate::pipeline::orchestrator::PipelineOrchestrator;
use crate::sessions::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Runs the posting pipeline and answers status queries from checkpoints.
    pub orchestrator: Arc<PipelineOrchestrator>,
    /// Feedback session registry, shared with the orchestrator so HTTP answers
    /// reach suspended validation agents.
    pub sessions: Arc<SessionRegistry>,
    /// Exposed for the usage stats endpoint; pipeline stages reach it through
    /// the orchestrator.
    pub capability: Arc<StructuredOutputCapability>,
}
