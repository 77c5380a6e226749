//! The transformer adapter.
//!
//! Thin façade over the front-end pipeline. Selects a parser flavor per
//! extension (TS/TSX files take the TypeScript-capable path, everything else
//! the Flow-capable one), skips type-only `.flow` variants, synthesizes JSON
//! modules, and drives the lowering + wrapping passes for everything else.

use std::path::Path;

use bungae_config::Platform;

use crate::lower::lower;
use crate::wrap::{count_lines, line_identity_mappings, wrap_module};
use crate::{ModuleKind, ModuleTransformer, Result, TransformError, TransformOptions, TransformOutput};

/// Identity the adapter reports downstream for every transform it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub bundler: &'static str,
    pub name: String,
    pub platform: Platform,
    pub is_dev: bool,
    pub is_server: bool,
    pub engine: &'static str,
}

impl CallerIdentity {
    pub fn new(name: impl Into<String>, platform: Platform, is_dev: bool) -> Self {
        Self {
            bundler: "bungae",
            name: name.into(),
            platform,
            is_dev,
            is_server: false,
            engine: "hermes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserFlavor {
    TypeScript,
    Flow,
}

impl ParserFlavor {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts") | Some("tsx") => ParserFlavor::TypeScript,
            _ => ParserFlavor::Flow,
        }
    }
}

/// The default [`ModuleTransformer`] implementation.
#[derive(Debug, Default, Clone)]
pub struct TransformerAdapter;

impl TransformerAdapter {
    pub fn new() -> Self {
        Self
    }

    fn transform_json(&self, path: &Path, source: &str) -> Result<TransformOutput> {
        // Validate and re-serialize so the emitted literal is canonical.
        let value: serde_json::Value =
            serde_json::from_str(source).map_err(|source| TransformError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;
        let body = format!("module.exports = {value};");
        let code = wrap_module(&body);
        let line_count = count_lines(&code);
        Ok(TransformOutput {
            raw_mappings: vec![],
            code,
            dependencies: vec![],
            line_count,
            kind: ModuleKind::Json,
        })
    }
}

impl ModuleTransformer for TransformerAdapter {
    fn transform(
        &self,
        path: &Path,
        source: &str,
        options: &TransformOptions,
    ) -> Result<Option<TransformOutput>> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        // Type-only companions carry no runtime code.
        if file_name.ends_with(".flow") || file_name.contains(".flow.") {
            return Ok(None);
        }

        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            return self.transform_json(path, source).map(Some);
        }

        let caller = CallerIdentity::new(
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("module"),
            options.platform,
            options.dev,
        );
        let flavor = ParserFlavor::for_path(path);
        tracing::trace!(
            path = %path.display(),
            ?flavor,
            bundler = caller.bundler,
            engine = caller.engine,
            "transforming module"
        );

        let lowered = lower(path, source, options.dev)?;
        let code = wrap_module(&lowered.body);
        let line_count = count_lines(&code);
        let raw_mappings = line_identity_mappings(lowered.source_line_count, &code);

        Ok(Some(TransformOutput {
            code,
            dependencies: lowered.dependencies,
            raw_mappings,
            line_count,
            kind: ModuleKind::Module,
        }))
    }
}
