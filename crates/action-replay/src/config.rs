//! Configuration types for action-replay.
//!
//! This module defines configuration structures for playback timing,
//! recording limits and logging. Values can be layered from defaults, a
//! TOML file ([`file`]) and `ACTION_REPLAY_*` environment variables
//! ([`env`]).

pub mod env;
pub mod file;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReplayError, Result, check_speed};

/// Default player tick interval (10 ms).
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Default playback speed.
pub const DEFAULT_SPEED: f64 = 1.0;

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Player tick interval.
    #[serde(with = "duration_ms")]
    pub tick: Duration,

    /// Speed selected before any `SpeedChanged` request.
    pub default_speed: f64,

    /// Whether events are forwarded to the sink while recording.
    pub live_echo: bool,

    /// Recording limits.
    pub recording: RecordingLimits,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            default_speed: DEFAULT_SPEED,
            live_echo: true,
            recording: RecordingLimits::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ReplayConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval.
    #[must_use]
    pub const fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Set the default speed.
    #[must_use]
    pub const fn default_speed(mut self, speed: f64) -> Self {
        self.default_speed = speed;
        self
    }

    /// Set whether recorded events are echoed to the sink.
    #[must_use]
    pub const fn live_echo(mut self, enabled: bool) -> Self {
        self.live_echo = enabled;
        self
    }

    /// Set the recording limits.
    #[must_use]
    pub const fn recording(mut self, limits: RecordingLimits) -> Self {
        self.recording = limits;
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tick.is_zero() {
            return Err(ReplayError::config("tick interval must be greater than zero"));
        }
        check_speed(self.default_speed)?;
        if self.recording.max_events == Some(0) {
            return Err(ReplayError::config("max_events must be greater than zero"));
        }
        Ok(())
    }
}

/// Limits applied to a single recording.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingLimits {
    /// Maximum events to record.
    pub max_events: Option<usize>,

    /// Maximum recording duration.
    #[serde(with = "opt_duration_ms")]
    pub max_duration: Option<Duration>,
}

impl RecordingLimits {
    /// Create limits that never stop a recording.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Set maximum events.
    #[must_use]
    pub const fn max_events(mut self, count: usize) -> Self {
        self.max_events = Some(count);
        self
    }

    /// Set maximum duration.
    #[must_use]
    pub const fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }
}

/// Configuration for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive.
    pub filter: String,

    /// Emit newline-delimited JSON instead of human-readable lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter directive.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set JSON output.
    #[must_use]
    pub const fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod opt_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
