//! Tracing subscriber installation.
//!
//! The engine itself only emits `tracing` events. Binaries and demos call
//! [`init`] once to print them.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;
use crate::error::{ReplayError, Result};

fn filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(&config.filter)
        .map_err(|e| ReplayError::config(format!("invalid log filter '{}': {e}", config.filter)))
}

/// Install a global subscriber for the given configuration.
///
/// Fails if the filter directive does not parse or a global subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true),
            )
            .try_init()
    };

    installed.map_err(|e| ReplayError::config(format!("tracing subscriber not installed: {e}")))
}
