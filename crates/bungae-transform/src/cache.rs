//! Persistent transform cache.
//!
//! Content-addressed store of per-file transform outputs, sharded two levels
//! deep (`<aa>/<bb>/<hash>.json`) to bound directory fan-out. The cache is
//! advisory: every failure mode (missing entry, stale mtime, corrupt JSON,
//! I/O error) reads as a miss, and the whole directory is safe to delete at
//! any time. The AST is never cached; entries hold the wrapped code, its raw
//! mappings, and the original specifiers.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use bungae_config::Platform;

use crate::mapping::RawMapping;
use crate::ModuleKind;

/// Inputs that address a cache entry. Everything that changes the transform
/// output participates; the source text doubles as the content nonce.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeyInputs<'a> {
    pub path: &'a Path,
    pub platform: Platform,
    pub dev: bool,
    pub project_root: &'a Path,
    pub inline_requires: bool,
    pub source: &'a str,
}

/// One cached transform output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub transformed_code: String,
    #[serde(rename = "source_map")]
    pub raw_mappings: Vec<RawMapping>,
    pub original_specifiers: Vec<String>,
    pub line_count: u32,
    pub kind: ModuleKind,
    /// Seconds since the epoch at write time.
    pub timestamp: u64,
}

pub struct TransformCache {
    dir: PathBuf,
    max_age: Duration,
}

impl TransformCache {
    pub fn new(dir: PathBuf, max_age: Duration) -> Self {
        Self { dir, max_age }
    }

    /// SHA-256 key over the addressing inputs, NUL-separated.
    pub fn key(&self, inputs: &CacheKeyInputs<'_>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(inputs.path.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(inputs.platform.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(if inputs.dev { &b"dev"[..] } else { &b"prod"[..] });
        hasher.update(b"\0");
        hasher.update(inputs.project_root.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(if inputs.inline_requires { b"1" } else { b"0" } as &[u8]);
        hasher.update(b"\0");
        hasher.update(Sha256::digest(inputs.source.as_bytes()));
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(&key[0..2]).join(&key[2..4]).join(format!("{key}.json"))
    }

    /// Look up a valid entry, or `None`.
    ///
    /// Validity: the cache file exists, its mtime is within the max age, and
    /// the source file's mtime is not newer than the cache file's mtime.
    pub fn get(&self, inputs: &CacheKeyInputs<'_>) -> Option<CacheEntry> {
        let entry_path = self.entry_path(&self.key(inputs));
        let cache_meta = std::fs::metadata(&entry_path).ok()?;
        let cache_mtime = cache_meta.modified().ok()?;

        if let Ok(age) = SystemTime::now().duration_since(cache_mtime) {
            if age > self.max_age {
                return None;
            }
        }
        if let Ok(source_meta) = std::fs::metadata(inputs.path) {
            if let Ok(source_mtime) = source_meta.modified() {
                if source_mtime > cache_mtime {
                    return None;
                }
            }
        }

        let content = std::fs::read_to_string(&entry_path).ok()?;
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(err) => {
                // Corrupt entries are treated as misses and ignored.
                tracing::warn!(entry = %entry_path.display(), %err, "corrupt cache entry");
                None
            }
        }
    }

    /// Write an entry. Failures are reported to the caller, who treats the
    /// cache as advisory and continues.
    pub fn set(&self, inputs: &CacheKeyInputs<'_>, entry: &CacheEntry) -> std::io::Result<()> {
        let entry_path = self.entry_path(&self.key(inputs));
        if let Some(parent) = entry_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&entry_path, json)
    }

    /// Delete the whole cache directory (`--reset-cache`).
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Current time in seconds since the epoch, for entry timestamps.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
