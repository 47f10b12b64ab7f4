use std::str::FromStr;

use anyhow::{Context, Result};

use crate::llm_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// When unset, queues and the status ledger live in process memory. Handy
    /// for local development; nothing survives a restart.
    pub redis_url: Option<String>,
    pub gemini_api_key: String,
    pub generation_model: String,
    pub generation_base_url: String,
    pub generation_timeout_secs: u64,
    /// Retention window of a job's status ledger, refreshed on every append.
    pub ledger_ttl_secs: u64,
    /// Workers spawned per stage queue.
    pub worker_concurrency: usize,
    pub queue_poll_interval_ms: u64,
    /// Re-prompts allowed when a generation reply is not decodable JSON.
    pub reprompt_attempts: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            redis_url: optional_env("REDIS_URL"),
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            generation_model: std::env::var("GENERATION_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            generation_base_url: std::env::var("GENERATION_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            generation_timeout_secs: parse_env("GENERATION_TIMEOUT_SECS", 120)?,
            ledger_ttl_secs: parse_env("LEDGER_TTL_SECS", 86_400)?,
            worker_concurrency: parse_env("WORKER_CONCURRENCY", 2)?,
            queue_poll_interval_ms: parse_env("QUEUE_POLL_INTERVAL_MS", 500)?,
            reprompt_attempts: parse_env("REPROMPT_ATTEMPTS", 0)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are treated alike.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
