//! The delta engine.
//!
//! Recomputes a graph transition from a changed-file list: changed paths
//! that still exist are re-processed in isolation (reusing every untouched
//! node), paths that no longer exist are removed, modules that become
//! unreachable from the entry are pruned, and the old and new graphs are
//! classified into added/modified/deleted by per-module hashes.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use sha2::{Digest, Sha256};

use crate::builder::GraphBuilder;
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::module::Module;
use crate::progress::NullObserver;

/// A graph transition.
#[derive(Debug)]
pub struct DeltaResult {
    pub graph: Graph,
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl DeltaResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Content hash of a module: transformed code plus its sorted dependency
/// paths, so both edits and re-resolutions register as modifications.
pub fn module_hash(module: &Module) -> String {
    let mut descriptors: Vec<String> = module
        .dependencies
        .iter()
        .map(|dep| match dep.path() {
            Some(path) => path.to_string_lossy().into_owned(),
            None => "<unresolved>".to_string(),
        })
        .collect();
    descriptors.sort();

    let mut hasher = Sha256::new();
    hasher.update(module.code.as_bytes());
    for descriptor in descriptors {
        hasher.update(b"\0");
        hasher.update(descriptor.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Apply a changed-file set to `old`, producing the next graph and its
/// classification against the previous one.
pub fn compute_delta(
    builder: &GraphBuilder<'_>,
    old: &Graph,
    changed: &[PathBuf],
) -> Result<DeltaResult> {
    // Only changes intersecting this graph matter to this session.
    let relevant: Vec<&PathBuf> = changed.iter().filter(|p| old.modules.contains_key(*p)).collect();
    if relevant.is_empty() {
        return Ok(DeltaResult {
            graph: old.clone(),
            added: vec![],
            modified: vec![],
            deleted: vec![],
        });
    }

    if !old.entry.is_file() {
        return Err(GraphError::EntryMissing {
            path: old.entry.clone(),
        });
    }

    let (existing, gone): (Vec<&PathBuf>, Vec<&PathBuf>) =
        relevant.into_iter().partition(|p| p.is_file());

    let mut reprocess: Vec<PathBuf> = existing.into_iter().cloned().collect();
    let mut graph = old.clone();
    for path in gone {
        // Dependents of a removed file re-resolve their now-dangling slots.
        if let Some(removed) = old.modules.get(path) {
            for parent in &removed.inverse_dependencies {
                if parent.is_file() && !reprocess.contains(parent) {
                    reprocess.push(parent.clone());
                }
            }
        }
        graph.modules.shift_remove(path);
    }
    builder.process_into(&reprocess, &mut graph.modules, &mut NullObserver)?;

    prune_unreachable(&mut graph);
    graph.link_inverse_dependencies();

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for (path, module) in &graph.modules {
        match old.modules.get(path) {
            None => added.push(path.clone()),
            Some(old_module) => {
                if module_hash(old_module) != module_hash(module) {
                    modified.push(path.clone());
                }
            }
        }
    }
    let deleted: Vec<PathBuf> = old
        .modules
        .keys()
        .filter(|path| !graph.modules.contains_key(*path))
        .cloned()
        .collect();

    Ok(DeltaResult {
        graph,
        added,
        modified,
        deleted,
    })
}

/// Drop modules no longer reachable from the entry, so removed edges turn
/// into deletions instead of lingering dead nodes.
fn prune_unreachable(graph: &mut Graph) {
    let mut reachable = FxHashSet::default();
    let mut stack = vec![graph.entry.clone()];
    while let Some(path) = stack.pop() {
        if !reachable.insert(path.clone()) {
            continue;
        }
        if let Some(module) = graph.modules.get(&path) {
            for dep in module.resolved_dependencies() {
                if !reachable.contains(dep) {
                    stack.push(dep.to_path_buf());
                }
            }
        }
    }
    graph
        .modules
        .retain(|path, _| reachable.contains(path.as_path()));
}
