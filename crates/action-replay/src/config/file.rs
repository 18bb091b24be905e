//! File-based configuration loading.
//!
//! Configuration files are TOML documents mirroring [`ReplayConfig`]:
//!
//! ```toml
//! tick = 10            # milliseconds
//! default_speed = 2.0
//! live_echo = true
//!
//! [recording]
//! max_events = 100000
//! max_duration = 600000  # milliseconds
//!
//! [logging]
//! filter = "action_replay=debug"
//! json = false
//! ```

use std::path::Path;

use super::ReplayConfig;
use super::env::EnvConfig;
use crate::error::Result;

/// Parse a configuration from TOML text.
pub fn from_toml_str(text: &str) -> Result<ReplayConfig> {
    let config: ReplayConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Load a configuration file.
pub fn load_file(path: impl AsRef<Path>) -> Result<ReplayConfig> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "Loading configuration file");
    let text = std::fs::read_to_string(path)?;
    from_toml_str(&text)
}

/// Load a configuration file (if given) and apply environment overrides.
pub fn load_layered(path: Option<&Path>, env: &EnvConfig) -> Result<ReplayConfig> {
    let base = match path {
        Some(path) => load_file(path)?,
        None => ReplayConfig::default(),
    };
    env.apply(base)
}
