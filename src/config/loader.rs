// src/config/loader.rs
//! TOML configuration loading with validation

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::config::constants::acquisition::{MAX_SAMPLE_CAPACITY, MIN_SAMPLE_CAPACITY};
use crate::config::AcquisitionConfig;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration file is not valid TOML for [`AcquisitionConfig`]
    #[error("configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Configuration parsed but fails a semantic check
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Load and validate a configuration file
pub fn load_from_path(path: impl AsRef<Path>) -> Result<AcquisitionConfig, ConfigError> {
    let raw = fs::read_to_string(path.as_ref())?;
    let config = load_from_str(&raw)?;
    debug!(path = %path.as_ref().display(), "loaded acquisition configuration");
    Ok(config)
}

/// Parse and validate configuration from a TOML string
pub fn load_from_str(raw: &str) -> Result<AcquisitionConfig, ConfigError> {
    let config: AcquisitionConfig = toml::from_str(raw)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AcquisitionConfig) -> Result<(), ConfigError> {
    if config.channels.is_empty() {
        return Err(ConfigError::Invalid(
            "channel mask selects no channel".to_string(),
        ));
    }
    let capacity = config.sample_capacity;
    if capacity == 0 || capacity & (capacity - 1) != 0 {
        return Err(ConfigError::Invalid(format!(
            "sample capacity {capacity} is not a power of two"
        )));
    }
    if !(MIN_SAMPLE_CAPACITY..=MAX_SAMPLE_CAPACITY).contains(&capacity) {
        return Err(ConfigError::Invalid(format!(
            "sample capacity {capacity} outside {MIN_SAMPLE_CAPACITY}..={MAX_SAMPLE_CAPACITY}"
        )));
    }
    if config.read_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "read timeout must be non-zero".to_string(),
        ));
    }
    Ok(())
}
