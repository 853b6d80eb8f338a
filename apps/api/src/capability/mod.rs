//! Structured-output capability: the single point of entry for all model
//! calls in Postsmith.
//!
//! ARCHITECTURAL RULE: No other module may call a provider API directly.
//! All generation MUST go through [`StructuredOutputCapability`], which walks
//! its providers in configuration order and falls back on failure.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::AppError;

pub mod anthropic;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Provider returned empty content")]
    EmptyContent,
}

/// A model endpoint that turns a system instruction plus a payload into a
/// JSON value. Implementations own their transport, retries, and fence
/// stripping.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, system: &str, payload: &str) -> Result<Value, ProviderError>;
}

/// Per-provider call counters, reported by the stats endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderUsage {
    pub calls: u64,
    pub failures: u64,
    pub total_latency_ms: u64,
}

/// Ordered-failover front for one or more [`Provider`]s.
///
/// The first provider is primary. On any failure (transport, API, or the
/// returned JSON not matching the requested shape) the next provider is
/// tried; only when the list is exhausted does the caller see an error.
pub struct StructuredOutputCapability {
    providers: Vec<Arc<dyn Provider>>,
    usage: Mutex<HashMap<String, ProviderUsage>>,
}

impl StructuredOutputCapability {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        StructuredOutputCapability {
            providers,
            usage: Mutex::new(HashMap::new()),
        }
    }

    /// Generates a `T` from the first provider that produces JSON matching
    /// the requested shape.
    pub async fn generate<T: DeserializeOwned>(
        &self,
        system: &str,
        payload: &str,
    ) -> Result<T, AppError> {
        if self.providers.is_empty() {
            return Err(AppError::Generation("no providers configured".to_string()));
        }

        let mut failures: Vec<String> = Vec::new();

        for provider in &self.providers {
            let started = Instant::now();
            let result = provider.generate(system, payload).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(value) => match serde_json::from_value::<T>(value) {
                    Ok(parsed) => {
                        self.record(provider.name(), latency_ms, false);
                        debug!(
                            provider = provider.name(),
                            latency_ms, "structured output generated"
                        );
                        return Ok(parsed);
                    }
                    Err(e) => {
                        self.record(provider.name(), latency_ms, true);
                        warn!(
                            provider = provider.name(),
                            "provider returned JSON of the wrong shape: {e}"
                        );
                        failures.push(format!("{}: wrong shape: {e}", provider.name()));
                    }
                },
                Err(e) => {
                    self.record(provider.name(), latency_ms, true);
                    warn!(provider = provider.name(), "provider call failed: {e}");
                    failures.push(format!("{}: {e}", provider.name()));
                }
            }
        }

        Err(AppError::Generation(format!(
            "All providers failed: [{}]",
            failures.join("; ")
        )))
    }

    fn record(&self, provider: &str, latency_ms: u64, failed: bool) {
        let mut usage = self
            .usage
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = usage.entry(provider.to_string()).or_default();
        entry.calls += 1;
        entry.total_latency_ms += latency_ms;
        if failed {
            entry.failures += 1;
        }
    }

    /// Snapshot of per-provider counters, sorted by provider name.
    pub fn usage_snapshot(&self) -> BTreeMap<String, ProviderUsage> {
        let usage = self
            .usage
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        usage
            .iter()
            .map(|(name, stats)| (name.clone(), stats.clone()))
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
