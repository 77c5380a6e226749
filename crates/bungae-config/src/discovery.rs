//! Config-file discovery for CLI use.
//!
//! Walks upward from a start directory looking for `bungae.config.json`.
//! Library users construct [`BundlerConfig`] directly; the CLI goes through
//! discovery so that commands work from any subdirectory of a project.

use std::path::{Path, PathBuf};

use crate::config::BundlerConfig;
use crate::error::{ConfigError, Result};

/// The conventional config file name.
pub const CONFIG_FILE_NAME: &str = "bungae.config.json";

pub struct ConfigDiscovery {
    start: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(start: impl AsRef<Path>) -> Self {
        Self {
            start: start.as_ref().to_path_buf(),
        }
    }

    /// Find the nearest config file at or above the start directory.
    pub fn find(&self) -> Option<PathBuf> {
        let mut dir = self.start.as_path();
        loop {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            dir = dir.parent()?;
        }
    }

    /// Load configuration from the discovered file, or defaults rooted at the
    /// start directory when no file exists.
    pub fn load(&self) -> Result<BundlerConfig> {
        match self.find() {
            Some(path) => {
                let root = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.start.clone());
                tracing::debug!(config = %path.display(), "loaded config file");
                BundlerConfig::load(&root, Some(&path))
            }
            None => BundlerConfig::load(&self.start, None),
        }
    }

    /// Load from an explicit path, failing if it does not exist.
    pub fn load_from(&self, path: &Path) -> Result<BundlerConfig> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.start.clone());
        BundlerConfig::load(&root, Some(path))
    }
}
