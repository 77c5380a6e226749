//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config file was found while walking upward from the start directory.
    #[error("Config file not found (searched upward from {})\n\nHint: create a bungae.config.json or pass --config <file>", .0.display())]
    NotFound(PathBuf),

    /// A field failed validation. The message names the field and the value
    /// actually received, per the ConfigInvalid contract.
    #[error("Invalid config field '{field}': received {received}\n\nHint: {hint}")]
    InvalidField {
        field: String,
        received: String,
        hint: String,
    },

    /// figment-level extraction failure (type mismatches, unknown fields).
    #[error("Failed to load configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Extract(Box::new(err))
    }
}
