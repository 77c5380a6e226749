//! The dependency graph.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::module::Module;

/// A built dependency graph.
///
/// `modules` preserves insertion order, which the delta engine relies on for
/// deterministic iteration. `prepend` holds script-kind modules (the
/// synthetic prelude, the in-bundle runtime, platform polyfills) executed
/// before any defined module; the serializer fills it.
#[derive(Debug, Clone)]
pub struct Graph {
    pub modules: IndexMap<PathBuf, Module>,
    pub entry: PathBuf,
    pub prepend: Vec<Module>,
    /// Module paths the runtime executes before the entry.
    pub run_before_main: Vec<PathBuf>,
}

impl Graph {
    pub fn new(entry: PathBuf) -> Self {
        Self {
            modules: IndexMap::new(),
            entry,
            prepend: Vec::new(),
            run_before_main: Vec::new(),
        }
    }

    pub fn module(&self, path: &Path) -> Option<&Module> {
        self.modules.get(path)
    }

    /// The final linking pass: clear and recompute every module's
    /// inverse-dependency set from the forward edges.
    pub fn link_inverse_dependencies(&mut self) {
        for module in self.modules.values_mut() {
            module.inverse_dependencies.clear();
        }
        let edges: Vec<(PathBuf, PathBuf)> = self
            .modules
            .iter()
            .flat_map(|(from, module)| {
                module
                    .resolved_dependencies()
                    .map(|to| (to.to_path_buf(), from.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (to, from) in edges {
            if let Some(target) = self.modules.get_mut(&to) {
                target.inverse_dependencies.insert(from);
            }
        }
    }

    /// Inverse-edge symmetry check: every forward edge has a matching
    /// inverse edge and vice versa. Used by tests after builds and deltas.
    pub fn inverse_edges_consistent(&self) -> bool {
        for (path, module) in &self.modules {
            for dep in module.resolved_dependencies() {
                if let Some(target) = self.modules.get(dep) {
                    if !target.inverse_dependencies.contains(path) {
                        return false;
                    }
                }
            }
            for parent in &module.inverse_dependencies {
                let Some(parent_module) = self.modules.get(parent) else {
                    return false;
                };
                if !parent_module
                    .resolved_dependencies()
                    .any(|d| d == path.as_path())
                {
                    return false;
                }
            }
        }
        true
    }
}
