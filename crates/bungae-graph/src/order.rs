//! Canonical module ordering.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::graph::Graph;

/// Post-order depth-first traversal from the entry, visiting each module's
/// dependencies in their recorded order before the module itself. Modules
/// not reachable from the entry are appended afterwards in map iteration
/// order as a safety net; normal builds produce none.
pub fn post_order(graph: &Graph) -> Vec<PathBuf> {
    let mut visited = FxHashSet::default();
    let mut order = Vec::with_capacity(graph.modules.len());
    visit(graph, &graph.entry, &mut visited, &mut order);

    for path in graph.modules.keys() {
        if !visited.contains(path.as_path()) {
            order.push(path.clone());
        }
    }
    order
}

fn visit(graph: &Graph, path: &Path, visited: &mut FxHashSet<PathBuf>, order: &mut Vec<PathBuf>) {
    if !visited.insert(path.to_path_buf()) {
        return;
    }
    let Some(module) = graph.modules.get(path) else {
        return;
    };
    for dependency in module.resolved_dependencies() {
        visit(graph, dependency, visited, order);
    }
    order.push(path.to_path_buf());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Dependency, Module};
    use bungae_transform::ModuleKind;
    use std::collections::BTreeSet;

    fn module(path: &str, deps: &[&str]) -> Module {
        Module {
            path: PathBuf::from(path),
            original_source: String::new(),
            code: String::new(),
            dependencies: deps
                .iter()
                .map(|d| Dependency::Resolved(PathBuf::from(d)))
                .collect(),
            original_specifiers: deps.iter().map(|d| d.to_string()).collect(),
            inverse_dependencies: BTreeSet::new(),
            raw_mappings: vec![],
            line_count: 1,
            kind: ModuleKind::Module,
        }
    }

    fn graph_of(entry: &str, modules: Vec<Module>) -> Graph {
        let mut graph = Graph::new(PathBuf::from(entry));
        for m in modules {
            graph.modules.insert(m.path.clone(), m);
        }
        graph
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let graph = graph_of(
            "/e",
            vec![
                module("/e", &["/a", "/b"]),
                module("/a", &["/c"]),
                module("/b", &[]),
                module("/c", &[]),
            ],
        );
        let order = post_order(&graph);
        assert_eq!(
            order,
            vec![
                PathBuf::from("/c"),
                PathBuf::from("/a"),
                PathBuf::from("/b"),
                PathBuf::from("/e"),
            ]
        );
    }

    #[test]
    fn test_cycle_emits_each_once() {
        let graph = graph_of("/a", vec![module("/a", &["/b"]), module("/b", &["/a"])]);
        let order = post_order(&graph);
        assert_eq!(order.len(), 2);
        // The cycle partner is emitted before the entry completes.
        assert_eq!(order[1], PathBuf::from("/a"));
    }

    #[test]
    fn test_unreachable_appended() {
        let graph = graph_of(
            "/e",
            vec![module("/e", &[]), module("/orphan", &[])],
        );
        let order = post_order(&graph);
        assert_eq!(order, vec![PathBuf::from("/e"), PathBuf::from("/orphan")]);
    }

    #[test]
    fn test_post_order_property() {
        // For every module, each reachable dependency sits at a smaller index.
        let graph = graph_of(
            "/e",
            vec![
                module("/e", &["/a", "/b"]),
                module("/a", &["/b"]),
                module("/b", &["/c"]),
                module("/c", &[]),
            ],
        );
        let order = post_order(&graph);
        let index_of = |p: &str| order.iter().position(|x| x == Path::new(p)).unwrap();
        for (path, m) in &graph.modules {
            for dep in m.resolved_dependencies() {
                if dep != path.as_path() {
                    assert!(index_of(dep.to_str().unwrap()) < index_of(path.to_str().unwrap()));
                }
            }
        }
    }
}
