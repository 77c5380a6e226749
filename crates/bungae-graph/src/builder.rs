//! The graph builder.
//!
//! Walks the dependency tree from an entry point, gating re-entry on the
//! visited and processing sets, reusing valid transform-cache entries, and
//! recursing into each module's dependencies before emitting its processed
//! tick so that `processed <= total` holds at every observable moment.
//! Cycles are allowed; the gates stop the recursion and the final linking
//! pass recomputes inverse edges over the whole map.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use bungae_config::{BundlerConfig, Platform};
use bungae_resolver::Resolver;
use bungae_transform::{
    now_epoch_secs, CacheEntry, CacheKeyInputs, ModuleKind, ModuleTransformer, TransformCache,
    TransformOptions,
};

use crate::assets::synthesize_asset_module;
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::module::{Dependency, Module};
use crate::progress::ProgressObserver;

/// Per-build options.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub platform: Platform,
    pub dev: bool,
}

pub struct GraphBuilder<'a> {
    config: &'a BundlerConfig,
    resolver: &'a Resolver,
    transformer: &'a dyn ModuleTransformer,
    cache: Option<&'a TransformCache>,
    options: BuildOptions,
}

struct BuildState<'obs> {
    visited: FxHashSet<PathBuf>,
    processing: FxHashSet<PathBuf>,
    modules: IndexMap<PathBuf, Module>,
    discovered: usize,
    processed: usize,
    observer: &'obs mut dyn ProgressObserver,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        config: &'a BundlerConfig,
        resolver: &'a Resolver,
        transformer: &'a dyn ModuleTransformer,
        cache: Option<&'a TransformCache>,
        options: BuildOptions,
    ) -> Self {
        Self {
            config,
            resolver,
            transformer,
            cache,
            options,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build the full graph from `entry`.
    pub fn build(&self, entry: &Path, observer: &mut dyn ProgressObserver) -> Result<Graph> {
        if !entry.is_file() {
            return Err(GraphError::EntryMissing {
                path: entry.to_path_buf(),
            });
        }
        let mut state = BuildState {
            visited: FxHashSet::default(),
            processing: FxHashSet::default(),
            modules: IndexMap::new(),
            discovered: 0,
            processed: 0,
            observer,
        };
        self.process_module(entry, None, &mut state)?;

        let mut graph = Graph::new(entry.to_path_buf());
        graph.modules = state.modules;
        graph.link_inverse_dependencies();
        Ok(graph)
    }

    /// Re-process a set of paths against an existing module map, reusing
    /// untouched nodes. Used by the delta engine.
    pub(crate) fn process_into(
        &self,
        paths: &[PathBuf],
        modules: &mut IndexMap<PathBuf, Module>,
        observer: &mut dyn ProgressObserver,
    ) -> Result<()> {
        let mut state = BuildState {
            visited: modules.keys().cloned().collect(),
            processing: FxHashSet::default(),
            modules: std::mem::take(modules),
            discovered: 0,
            processed: 0,
            observer,
        };
        for path in paths {
            state.visited.remove(path);
            state.modules.shift_remove(path);
            self.process_module(path, None, &mut state)?;
        }
        *modules = state.modules;
        Ok(())
    }

    fn process_module(
        &self,
        path: &Path,
        referrer: Option<&Path>,
        state: &mut BuildState<'_>,
    ) -> Result<()> {
        if state.visited.contains(path) || state.processing.contains(path) {
            return Ok(());
        }
        state.processing.insert(path.to_path_buf());
        state.discovered += 1;
        state.observer.on_discovered(state.discovered);

        let module = if self.is_asset(path) {
            self.build_asset_module(path)
        } else {
            self.build_source_module(path, referrer)?
        };

        state.processing.remove(path);
        state.visited.insert(path.to_path_buf());
        let dependencies: Vec<PathBuf> = module
            .resolved_dependencies()
            .map(Path::to_path_buf)
            .collect();
        state.modules.insert(path.to_path_buf(), module);

        for dependency in &dependencies {
            self.process_module(dependency, Some(path), state)?;
        }

        state.processed += 1;
        state
            .observer
            .on_processed(state.processed, state.discovered);
        Ok(())
    }

    fn is_asset(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.config.asset_exts.iter().any(|a| a == ext))
    }

    fn build_asset_module(&self, path: &Path) -> Module {
        let synthesis = synthesize_asset_module(
            path,
            &self.config.root,
            self.options.dev,
            &self.config.asset_registry_path,
        );
        let registry_specifier = self.config.asset_registry_path.clone();
        let registry_slot = match self.resolver.resolve(
            path,
            &registry_specifier,
            self.options.platform,
            self.options.dev,
        ) {
            Ok(resolved) => Dependency::Resolved(resolved),
            Err(err) => {
                tracing::warn!(%err, dev = self.options.dev, "dropping unresolved dependency slot");
                Dependency::Unresolved
            }
        };

        Module {
            path: path.to_path_buf(),
            original_source: String::new(),
            code: synthesis.code,
            dependencies: vec![registry_slot],
            original_specifiers: vec![registry_specifier],
            inverse_dependencies: BTreeSet::new(),
            raw_mappings: vec![],
            line_count: synthesis.line_count,
            kind: ModuleKind::Asset,
        }
    }

    fn build_source_module(&self, path: &Path, referrer: Option<&Path>) -> Result<Module> {
        let source = std::fs::read_to_string(path).map_err(|_| match referrer {
            Some(referrer) => GraphError::DependencyMissing {
                path: path.to_path_buf(),
                referrer: referrer.to_path_buf(),
            },
            None => GraphError::EntryMissing {
                path: path.to_path_buf(),
            },
        })?;

        let key_inputs = CacheKeyInputs {
            path,
            platform: self.options.platform,
            dev: self.options.dev,
            project_root: &self.config.root,
            inline_requires: self.config.inline_requires,
            source: &source,
        };

        let (code, specifiers, raw_mappings, line_count, kind) =
            match self.cache.and_then(|cache| cache.get(&key_inputs)) {
                Some(entry) => (
                    entry.transformed_code,
                    entry.original_specifiers,
                    entry.raw_mappings,
                    entry.line_count,
                    entry.kind,
                ),
                None => {
                    let transform_options = TransformOptions {
                        platform: self.options.platform,
                        dev: self.options.dev,
                        inline_requires: self.config.inline_requires,
                        project_root: self.config.root.clone(),
                    };
                    let output = self
                        .transformer
                        .transform(path, &source, &transform_options)?
                        // Deliberately skipped file kinds become empty modules
                        // so edges pointing at them stay satisfiable.
                        .unwrap_or_else(|| bungae_transform::TransformOutput {
                            code: bungae_transform::wrap_module(""),
                            dependencies: vec![],
                            raw_mappings: vec![],
                            line_count: 3,
                            kind: ModuleKind::Module,
                        });

                    if let Some(cache) = self.cache {
                        let entry = CacheEntry {
                            transformed_code: output.code.clone(),
                            raw_mappings: output.raw_mappings.clone(),
                            original_specifiers: output.dependencies.clone(),
                            line_count: output.line_count,
                            kind: output.kind,
                            timestamp: now_epoch_secs(),
                        };
                        if let Err(err) = cache.set(&key_inputs, &entry) {
                            tracing::warn!(path = %path.display(), %err, "cache write failed");
                        }
                    }
                    (
                        output.code,
                        output.dependencies,
                        output.raw_mappings,
                        output.line_count,
                        output.kind,
                    )
                }
            };

        // Resolve every slot in lock-step with its specifier.
        let mut dependencies = Vec::with_capacity(specifiers.len());
        for specifier in &specifiers {
            match self
                .resolver
                .resolve(path, specifier, self.options.platform, self.options.dev)
            {
                Ok(resolved) => dependencies.push(Dependency::Resolved(resolved)),
                Err(err) => {
                    tracing::warn!(%err, dev = self.options.dev, "dropping unresolved dependency slot");
                    dependencies.push(Dependency::Unresolved);
                }
            }
        }

        Ok(Module {
            path: path.to_path_buf(),
            original_source: source,
            code,
            dependencies,
            original_specifiers: specifiers,
            inverse_dependencies: BTreeSet::new(),
            raw_mappings,
            line_count,
            kind,
        })
    }
}
