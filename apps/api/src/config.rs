use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
///
/// The feedback knobs deliberately stay configuration rather than constants:
/// the cycle bound and poll interval are tuning values, not invariants.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// How many suspend/resume cycles a validation agent may go through
    /// before it gives up and keeps the subject unchanged.
    pub max_feedback_cycles: u32,
    /// How often a suspended workflow polls its feedback session.
    pub feedback_poll_interval_secs: u64,
    /// How long a feedback session stays `pending` before the sweep
    /// expires it.
    pub feedback_session_ttl_secs: u64,
    /// Wall-clock cap on how long a suspended workflow waits for an answer,
    /// independent of the session TTL.
    pub feedback_wait_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", "8080")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_feedback_cycles: env_or("MAX_FEEDBACK_CYCLES", "5")?,
            feedback_poll_interval_secs: env_or("FEEDBACK_POLL_INTERVAL_SECS", "2")?,
            feedback_session_ttl_secs: env_or("FEEDBACK_SESSION_TTL_SECS", "300")?,
            feedback_wait_timeout_secs: env_or("FEEDBACK_WAIT_TIMEOUT_SECS", "600")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T: std::str::FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .with_context(|| format!("Environment variable '{key}' must parse as {}", std::any::type_name::<T>()))
}
