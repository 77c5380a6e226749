//! File system watcher for the dev server.
//!
//! Watches the project root (and configured watch folders) recursively,
//! filters out the cache directory, VCS metadata, and hidden files, and
//! debounces rapid repeats of the same path before handing changes to the
//! server.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{CliError, Result};

/// One file change, collapsed from notify's event kinds.
#[derive(Debug, Clone)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl FileWatcher {
    /// Watch `roots` recursively, ignoring paths under any of
    /// `ignored_dirs`. Returns the watcher handle and the change channel.
    pub fn new(
        roots: Vec<PathBuf>,
        ignored_dirs: Vec<PathBuf>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        for root in &roots {
            if !root.exists() {
                return Err(CliError::FileNotFound(root.clone()));
            }
        }

        let (tx, rx) = mpsc::channel(256);
        let debounce = Duration::from_millis(debounce_ms);
        let mut last_event: Option<(PathBuf, Instant)> = None;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            for path in &event.paths {
                if should_ignore(path, &ignored_dirs) {
                    continue;
                }
                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };
                let _ = tx.blocking_send(change);
            }
        })
        .map_err(CliError::Watch)?;

        for root in &roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(CliError::Watch)?;
        }

        Ok((
            Self {
                _watcher: watcher,
                roots,
            },
            rx,
        ))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

fn should_ignore(path: &Path, ignored_dirs: &[PathBuf]) -> bool {
    for dir in ignored_dirs {
        if path.starts_with(dir) {
            return true;
        }
    }
    // Hidden files and VCS metadata.
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}
