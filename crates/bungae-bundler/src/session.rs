//! Build sessions.
//!
//! A session owns everything that must survive across rebuilds for one
//! configuration tuple: the id allocator, the last-known graph, a
//! monotonically increasing revision id, and the cached bundle bytes served
//! to repeat requests. Sessions never share state with one another.

use bungae_config::BundleParams;
use bungae_graph::{Graph, IdAllocator};

/// Cached output of the session's most recent serialization.
#[derive(Debug, Clone)]
pub struct CachedBundle {
    pub code: String,
    pub map_json: String,
    pub revision: u64,
    /// Modules changed by the delta that produced this revision (full
    /// rebuilds report the whole module count).
    pub files_changed: usize,
}

#[derive(Debug)]
pub struct BuildSession {
    pub params: BundleParams,
    pub ids: IdAllocator,
    pub graph: Option<Graph>,
    revision_id: u64,
    pub cached: Option<CachedBundle>,
}

impl BuildSession {
    pub fn new(params: BundleParams) -> Self {
        Self {
            params,
            ids: IdAllocator::new(),
            graph: None,
            revision_id: 0,
            cached: None,
        }
    }

    /// Advance to the next revision. Every delta (and the initial build)
    /// bumps this exactly once.
    pub fn bump_revision(&mut self) -> u64 {
        self.revision_id += 1;
        self.revision_id
    }

    pub fn revision_id(&self) -> u64 {
        self.revision_id
    }

    /// Revision rendered the way the wire protocol carries it.
    pub fn revision_hex(&self) -> String {
        format!("{:x}", self.revision_id)
    }

    /// Drop cached bytes after a file-change notification; in-flight
    /// responses may still stream the stale copy.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }
}
