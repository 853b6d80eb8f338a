//! Job-posting pipeline: structure, sensitivity validation, reference
//! retrieval, consolidation, draft generation, consistency validation.
//! All model calls go through the capability; no direct provider calls here.

pub mod consolidate;
pub mod draft;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
pub mod retrieval;
pub mod structure;
pub mod validators;
