//! CLI error hierarchy.
//!
//! Top-level `CliError` with automatic conversion from the domain crates.
//! Messages carry actionable hints where the failure has an obvious fix.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = CliError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] bungae_config::ConfigError),

    #[error("Build error: {0}")]
    Graph(#[from] bungae_graph::GraphError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] bungae_bundler::SerializeError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
