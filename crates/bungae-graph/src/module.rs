//! The module record.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use bungae_transform::{ModuleKind, RawMapping};

/// One dependency slot. Slot order is significant: slot `i` is the one the
/// lowered code addresses as `_dependencyMap[i]`, so an unresolved slot must
/// keep its position instead of shifting its successors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Resolved(PathBuf),
    /// Recorded with an explicit marker; the runtime index stays unbound.
    Unresolved,
}

impl Dependency {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Dependency::Resolved(path) => Some(path),
            Dependency::Unresolved => None,
        }
    }
}

/// A node of the dependency graph.
///
/// Created during graph building, mutated only to fill
/// `inverse_dependencies` in the final linking pass, and discarded when its
/// containing graph is replaced.
#[derive(Debug, Clone)]
pub struct Module {
    /// Absolute filesystem path; the node's identity within a graph.
    pub path: PathBuf,
    /// The untransformed text actually read (empty for binary assets).
    pub original_source: String,
    /// Wrapped transformed code, without the id/dependency tail.
    pub code: String,
    /// Ordered dependency slots; `dependencies.len() == original_specifiers.len()`.
    pub dependencies: Vec<Dependency>,
    /// The textual specifier at each slot.
    pub original_specifiers: Vec<String>,
    /// Paths that list this module in their `dependencies`.
    pub inverse_dependencies: BTreeSet<PathBuf>,
    /// Source positions of the wrapped code, module-relative.
    pub raw_mappings: Vec<RawMapping>,
    /// Newline-terminated line count of the wrapped code.
    pub line_count: u32,
    pub kind: ModuleKind,
}

impl Module {
    /// Resolved dependency paths, unresolved slots skipped.
    pub fn resolved_dependencies(&self) -> impl Iterator<Item = &Path> {
        self.dependencies.iter().filter_map(|d| d.path())
    }

    /// Slot-alignment invariant check, used by tests and debug assertions.
    pub fn slots_aligned(&self) -> bool {
        self.dependencies.len() == self.original_specifiers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_path() {
        let resolved = Dependency::Resolved(PathBuf::from("/a/b.js"));
        assert_eq!(resolved.path(), Some(Path::new("/a/b.js")));
        assert_eq!(Dependency::Unresolved.path(), None);
    }
}
