//! Environment configuration

use crate::candidates::DEFAULT_BATCH_SIZE;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub engine_url: String,
    pub engine_timeout: Duration,
    /// Attempts per evaluation, counting the first; 1 disables retrying
    pub engine_max_attempts: u32,
    pub engine_retry_base_delay: Duration,
    pub candidate_delay: Duration,
    pub candidate_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            engine_url: "http://127.0.0.1:8000".to_string(),
            engine_timeout: Duration::from_secs(120),
            engine_max_attempts: 1,
            engine_retry_base_delay: Duration::from_millis(500),
            candidate_delay: Duration::from_millis(500),
            candidate_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparseable keys keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parsed(&lookup, "CHAT_PORT").unwrap_or(defaults.port),
            engine_url: lookup("REASONING_ENGINE_URL")
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.engine_url),
            engine_timeout: parsed(&lookup, "REASONING_ENGINE_TIMEOUT_SECS")
                .map_or(defaults.engine_timeout, Duration::from_secs),
            engine_max_attempts: parsed(&lookup, "REASONING_ENGINE_MAX_ATTEMPTS")
                .unwrap_or(defaults.engine_max_attempts)
                .max(1),
            engine_retry_base_delay: parsed(&lookup, "REASONING_ENGINE_RETRY_BASE_MS")
                .map_or(defaults.engine_retry_base_delay, Duration::from_millis),
            candidate_delay: parsed(&lookup, "CANDIDATE_DELAY_MS")
                .map_or(defaults.candidate_delay, Duration::from_millis),
            candidate_batch_size: parsed(&lookup, "CANDIDATE_BATCH_SIZE")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.candidate_batch_size),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable setting, using default");
            None
        }
    }
}
