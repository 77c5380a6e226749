//! Prepend-block construction.
//!
//! Builds the synthetic `__prelude__`, the embedded in-bundle runtime, and
//! the configured platform polyfills as script-kind modules executed before
//! any defined module. The prelude declares only runtime-evaluated
//! expressions, so bundle bytes stay identical across rebuilds.

use std::collections::BTreeSet;
use std::path::PathBuf;

use bungae_config::BundlerConfig;
use bungae_graph::{Graph, Module, ModuleKind};
use bungae_transform::count_lines;

use crate::error::{Result, SerializeError};

/// The in-bundle runtime providing `__d`, `__r`, and the import helpers.
pub const RUNTIME_SOURCE: &str = include_str!("../assets/require.js");

/// Marker global identifying bundles produced by this bundler.
pub const BUNDLE_MARKER: &str = "__BUNGAE__";

/// Render the `__prelude__` source for a build.
pub fn prelude_source(config: &BundlerConfig, dev: bool) -> String {
    let mut declarations = vec![
        "__BUNDLE_START_TIME__=this.nativePerformanceNow?nativePerformanceNow():Date.now()"
            .to_string(),
        format!("__DEV__={dev}"),
        "process=this.process||{}".to_string(),
        "__METRO_GLOBAL_PREFIX__=''".to_string(),
        format!("{BUNDLE_MARKER}=true"),
    ];
    for (name, value) in &config.extra_globals {
        declarations.push(format!("{name}={value}"));
    }

    let mut source = format!("var {};\n", declarations.join(","));
    source.push_str(&format!(
        "process.env=process.env||{{}};process.env.NODE_ENV=process.env.NODE_ENV||{:?};\n",
        if dev { "development" } else { "production" }
    ));

    if dev && !config.require_cycle_ignore_patterns.is_empty() {
        let patterns: Vec<String> = config
            .require_cycle_ignore_patterns
            .iter()
            .map(|p| format!("/{}/", p.replace('/', "\\/")))
            .collect();
        source.push_str(&format!(
            "var __requireCycleIgnorePatterns=[{}];\n",
            patterns.join(",")
        ));
    }
    source
}

fn script_module(path: PathBuf, source: String, kind: ModuleKind) -> Module {
    let line_count = count_lines(&source);
    Module {
        path,
        original_source: String::new(),
        code: source,
        dependencies: vec![],
        original_specifiers: vec![],
        inverse_dependencies: BTreeSet::new(),
        raw_mappings: vec![],
        line_count,
        kind,
    }
}

/// Fill `graph.prepend` with the prelude, the runtime, and the configured
/// polyfills, in execution order. Idempotent.
pub fn fill_prepend(graph: &mut Graph, config: &BundlerConfig, dev: bool) -> Result<()> {
    if !graph.prepend.is_empty() {
        return Ok(());
    }

    graph.prepend.push(script_module(
        PathBuf::from("__prelude__"),
        prelude_source(config, dev),
        ModuleKind::VirtualPrelude,
    ));
    graph.prepend.push(script_module(
        PathBuf::from("require-runtime"),
        RUNTIME_SOURCE.to_string(),
        ModuleKind::Script,
    ));

    for polyfill in &config.polyfills {
        let path = config.absolute(polyfill);
        let source = std::fs::read_to_string(&path)
            .map_err(|_| SerializeError::PolyfillMissing { path: path.clone() })?;
        graph
            .prepend
            .push(script_module(path, source, ModuleKind::Script));
    }
    Ok(())
}
