//! Graph building errors.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    /// The entry point could not be read. Fatal for the build.
    #[error("Entry point not found: {}", .path.display())]
    EntryMissing { path: PathBuf },

    /// A resolved dependency vanished between resolution and read.
    #[error("Cannot read module {} (required by {})", .path.display(), .referrer.display())]
    DependencyMissing { path: PathBuf, referrer: PathBuf },

    /// The front-end failed; the offending path is carried by the source.
    #[error(transparent)]
    Transform(#[from] bungae_transform::TransformError),
}
