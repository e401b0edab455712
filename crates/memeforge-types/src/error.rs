//! Error types for settings loading.

use thiserror::Error;

/// Errors raised while assembling or validating [`crate::Settings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A config source could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings were read but hold values no component can use
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for SettingsError {
    fn from(err: config::ConfigError) -> Self {
        SettingsError::Config(err.to_string())
    }
}
