//! Engine configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::DEFAULT_ORIGIN;

const ENV_PREFIX: &str = "EFFECT_ENGINE_";

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on how long a bulk stop waits, in milliseconds.
    pub stop_ceiling_ms: u64,
    /// Slack added to the largest remaining timeout of a bulk stop, in milliseconds.
    pub stop_grace_ms: u64,
    /// Undelivered events retained per subscriber.
    pub event_capacity: usize,
    /// Stack size of each effect thread in bytes.
    pub thread_stack_size: usize,
    /// Origin reported for requests that carry none.
    pub default_origin: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stop_ceiling_ms: 5_000,
            stop_grace_ms: 250,
            event_capacity: 64,
            thread_stack_size: 2 * 1024 * 1024,
            default_origin: DEFAULT_ORIGIN.to_string(),
        }
    }
}

impl EngineConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bulk stop ceiling.
    #[must_use]
    pub fn with_stop_ceiling(mut self, ceiling: Duration) -> Self {
        self.stop_ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the bulk stop grace period.
    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the per-subscriber event capacity.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set the effect thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the default origin tag.
    #[must_use]
    pub fn with_default_origin(mut self, origin: impl Into<String>) -> Self {
        self.default_origin = origin.into();
        self
    }

    /// Bulk stop ceiling as a duration.
    #[must_use]
    pub const fn stop_ceiling(&self) -> Duration {
        Duration::from_millis(self.stop_ceiling_ms)
    }

    /// Bulk stop grace as a duration.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.stop_ceiling_ms == 0 {
            return Err("stop_ceiling_ms must be greater than 0".into());
        }
        if self.stop_grace_ms > self.stop_ceiling_ms {
            return Err("stop_grace_ms must not exceed stop_ceiling_ms".into());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        if self.default_origin.trim().is_empty() {
            return Err("default_origin must not be empty".into());
        }
        Ok(())
    }

    /// Parse engine configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `EFFECT_ENGINE_*` environment variables,
    /// loading a `.env` file first if present. Unset variables keep defaults.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary `EFFECT_ENGINE_*` lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("STOP_CEILING_MS") {
            cfg.stop_ceiling_ms = parse_var("STOP_CEILING_MS", &v)?;
        }
        if let Some(v) = var("STOP_GRACE_MS") {
            cfg.stop_grace_ms = parse_var("STOP_GRACE_MS", &v)?;
        }
        if let Some(v) = var("EVENT_CAPACITY") {
            cfg.event_capacity = parse_var("EVENT_CAPACITY", &v)?;
        }
        if let Some(v) = var("THREAD_STACK_SIZE") {
            cfg.thread_stack_size = parse_var("THREAD_STACK_SIZE", &v)?;
        }
        if let Some(v) = var("DEFAULT_ORIGIN") {
            cfg.default_origin = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{name}=`{value}`: {e}"))
}
