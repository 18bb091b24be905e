//! Error types for action-replay.
//!
//! Engine-side errors (an invalid speed, a write to a frozen log) are
//! returned synchronously from the call that triggers them. Collaborator
//! failures (an event source erroring, a sink refusing a batch) are carried
//! back through [`ReplayError`] so the session controller can unwind the
//! active run.

use thiserror::Error;

/// The main error type for action-replay operations.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Playback speed was zero, negative, or not a finite number.
    #[error("invalid playback speed {speed}: speed must be a positive, finite number")]
    InvalidSpeed {
        /// The rejected speed.
        speed: f64,
    },

    /// An event source failed while a recording was live.
    #[error("event source '{source_name}' failed: {message}")]
    SourceDelivery {
        /// Name of the source that failed.
        source_name: String,
        /// Description reported by the source.
        message: String,
    },

    /// An append was attempted on a log whose recording has ended.
    #[error("action log is frozen; the recording that owned it has ended")]
    LogFrozen,

    /// The rendering collaborator rejected a batch.
    #[error("sink failed: {0}")]
    Sink(#[from] SinkError),

    /// The recording merge task panicked or was aborted.
    #[error("recording task failed: {message}")]
    RecordingTaskFailed {
        /// Description of the join failure.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// An I/O error occurred (reading a configuration file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Error raised by a [`BatchSink`](crate::sink::BatchSink) that cannot render a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SinkError {
    /// Description of the failure.
    pub message: String,
}

impl SinkError {
    /// Create a sink error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error yielded by an event source stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SourceError {
    /// Description of the failure.
    pub message: String,
}

impl SourceError {
    /// Create a source error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type alias for action-replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;

impl ReplayError {
    /// Create an invalid speed error.
    #[must_use]
    pub const fn invalid_speed(speed: f64) -> Self {
        Self::InvalidSpeed { speed }
    }

    /// Create a source delivery error.
    pub fn source_delivery(source_name: impl Into<String>, error: &SourceError) -> Self {
        Self::SourceDelivery {
            source_name: source_name.into(),
            message: error.message.clone(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this is an invalid speed error.
    #[must_use]
    pub const fn is_invalid_speed(&self) -> bool {
        matches!(self, Self::InvalidSpeed { .. })
    }

    /// Check if this error came from an event source.
    #[must_use]
    pub const fn is_source_failure(&self) -> bool {
        matches!(self, Self::SourceDelivery { .. })
    }

    /// Check if this error came from the rendering sink.
    #[must_use]
    pub const fn is_sink_failure(&self) -> bool {
        matches!(self, Self::Sink(_))
    }
}

/// Validate a playback speed.
pub fn check_speed(speed: f64) -> Result<f64> {
    if speed.is_finite() && speed > 0.0 {
        Ok(speed)
    } else {
        Err(ReplayError::invalid_speed(speed))
    }
}
