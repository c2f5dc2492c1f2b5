use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::tailoring::workflow::WorkflowLimits;

/// Where drafts live between restarts.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftBackend {
    File { dir: String },
    Redis { url: String },
    Memory,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub user_id: String,
    pub draft_backend: DraftBackend,
    pub draft_session: String,
    pub draft_debounce: Duration,
    pub limits: WorkflowLimits,
    pub backend_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = WorkflowLimits::default();

        Ok(Config {
            api_base: optional_env("TAILOR_API_BASE", "http://localhost:8000"),
            user_id: optional_env("TAILOR_USER_ID", "demo"),
            draft_backend: draft_backend()?,
            draft_session: optional_env("DRAFT_SESSION", "default"),
            draft_debounce: Duration::from_millis(parse_env("DRAFT_DEBOUNCE_MS", 400)?),
            limits: WorkflowLimits {
                min_job_post_chars: parse_env("MIN_JOB_POST_CHARS", defaults.min_job_post_chars)?,
                min_answer_chars: parse_env("MIN_ANSWER_CHARS", defaults.min_answer_chars)?,
            },
            backend_timeout: Duration::from_secs(parse_env("BACKEND_TIMEOUT_SECS", 60)?),
            port: parse_env("PORT", 8081)?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }
}

fn draft_backend() -> Result<DraftBackend> {
    match optional_env("DRAFT_BACKEND", "file").to_lowercase().as_str() {
        "file" => Ok(DraftBackend::File {
            dir: optional_env("DRAFT_DIR", ".drafts"),
        }),
        "redis" => Ok(DraftBackend::Redis {
            url: require_env("REDIS_URL")?,
        }),
        "memory" => Ok(DraftBackend::Memory),
        other => bail!("DRAFT_BACKEND must be one of file, redis, memory (got '{other}')"),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}
