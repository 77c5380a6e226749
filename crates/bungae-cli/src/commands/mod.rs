//! Command implementations.

pub mod build;
pub mod serve;

use std::path::PathBuf;

use bungae_config::{BundlerConfig, ConfigDiscovery};

use crate::cli::CommonArgs;
use crate::error::Result;

/// Load configuration for a command: explicit `--config` wins, then upward
/// discovery from `--root` (or the working directory), then defaults.
/// CLI-level overrides are applied afterwards.
pub fn load_config(common: &CommonArgs) -> Result<BundlerConfig> {
    let start = match &common.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let discovery = ConfigDiscovery::new(&start);
    let mut config = match &common.config {
        Some(path) => discovery.load_from(path)?,
        None => discovery.load()?,
    };
    if let Some(root) = &common.root {
        config.root = root.clone();
    }
    if let Some(entry) = &common.entry {
        config.entry = entry.clone();
    }
    Ok(config)
}

/// Wipe the transform cache when `--reset-cache` was passed.
pub fn maybe_reset_cache(config: &BundlerConfig, reset: bool) -> Result<()> {
    if reset {
        let dir: PathBuf = config.cache_dir();
        tracing::info!(cache = %dir.display(), "resetting transform cache");
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
