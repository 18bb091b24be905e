//! Environment-based configuration.

use std::time::Duration;

use super::ReplayConfig;
use crate::error::{ReplayError, Result};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "ACTION_REPLAY";

/// Recognised environment variables (without prefix).
pub mod vars {
    /// Player tick interval in milliseconds.
    pub const TICK_MS: &str = "TICK_MS";
    /// Default playback speed.
    pub const SPEED: &str = "SPEED";
    /// Maximum events per recording.
    pub const MAX_EVENTS: &str = "MAX_EVENTS";
    /// Maximum recording duration in milliseconds.
    pub const MAX_DURATION_MS: &str = "MAX_DURATION_MS";
    /// Echo events to the sink while recording.
    pub const LIVE_ECHO: &str = "LIVE_ECHO";
    /// Tracing filter directive.
    pub const LOG: &str = "LOG";
    /// JSON log output.
    pub const LOG_JSON: &str = "LOG_JSON";
}

/// Environment variable reader.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a new environment config reader.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        std::env::var(self.var_name(name)).ok()
    }

    /// Get a parsed value, failing on values that do not parse.
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.get(name)
            .map(|raw| {
                raw.trim().parse().map_err(|_| {
                    ReplayError::config(format!("{} has invalid value '{raw}'", self.var_name(name)))
                })
            })
            .transpose()
    }

    /// Get a boolean value.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| {
            matches!(
                v.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on" | "enabled"
            )
        })
    }

    /// Get a duration in milliseconds.
    pub fn duration_millis(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_millis))
    }

    /// Overlay the variables that are set onto `config`.
    pub fn apply(&self, mut config: ReplayConfig) -> Result<ReplayConfig> {
        if let Some(tick) = self.duration_millis(vars::TICK_MS)? {
            config.tick = tick;
        }
        if let Some(speed) = self.parse(vars::SPEED)? {
            config.default_speed = speed;
        }
        if let Some(max) = self.parse(vars::MAX_EVENTS)? {
            config.recording.max_events = Some(max);
        }
        if let Some(limit) = self.duration_millis(vars::MAX_DURATION_MS)? {
            config.recording.max_duration = Some(limit);
        }
        if let Some(echo) = self.bool(vars::LIVE_ECHO) {
            config.live_echo = echo;
        }
        if let Some(filter) = self.get(vars::LOG) {
            config.logging.filter = filter;
        }
        if let Some(json) = self.bool(vars::LOG_JSON) {
            config.logging.json = json;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load the default configuration with environment overrides.
    pub fn load(&self) -> Result<ReplayConfig> {
        self.apply(ReplayConfig::default())
    }
}
