//! Serialization errors.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SerializeError>;

#[derive(Debug, Error)]
pub enum SerializeError {
    /// A wrapped module did not end with the expected closing pattern, so
    /// the id/dependency tail has no splice point.
    #[error("Malformed module wrapper for {}", .path.display())]
    MalformedWrapper { path: PathBuf },

    /// A configured polyfill could not be read.
    #[error("Polyfill not found: {}", .path.display())]
    PolyfillMissing { path: PathBuf },

    /// Bundle-level map could not be rendered.
    #[error("Source map generation failed: {0}")]
    MapGeneration(#[from] serde_json::Error),
}
