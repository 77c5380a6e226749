//! Module transformation for the Bungae bundler.
//!
//! The real AST pipeline (Babel/TypeScript-grade parsing and transforms) is a
//! pluggable collaborator behind the [`ModuleTransformer`] trait. This crate
//! ships the built-in front-end used by default: a lexical scanner that
//! collects dependency slots, lowers ESM syntax onto the in-bundle runtime's
//! CJS calling convention, and wraps each module body in a define call while
//! keeping line structure intact so that line-granular source mappings stay
//! valid. It also owns the persistent, content-addressed transform cache.

mod adapter;
mod cache;
mod lower;
mod mapping;
mod scanner;
mod wrap;

use std::path::{Path, PathBuf};

use thiserror::Error;

use bungae_config::Platform;

pub use adapter::{CallerIdentity, ParserFlavor, TransformerAdapter};
pub use cache::{now_epoch_secs, CacheEntry, CacheKeyInputs, TransformCache};
pub use mapping::RawMapping;
pub use wrap::{count_lines, wrap_module, MODULE_FACTORY_PARAMS};

/// What a module is, as far as serialization is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    /// Prepend-block script executed outside the module system.
    Script,
    /// Ordinary wrapped module.
    Module,
    /// Synthesized asset-registration module.
    Asset,
    /// Synthesized `module.exports = <literal>` JSON module.
    Json,
    /// The synthetic `__prelude__`.
    VirtualPrelude,
}

/// Per-call options for a transform.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub platform: Platform,
    pub dev: bool,
    /// Threaded into cache keys; the inline-requires pass itself belongs to
    /// the external AST pipeline.
    pub inline_requires: bool,
    pub project_root: PathBuf,
}

/// Output of a successful transform: the wrapped define call (without its
/// id/dependency tail), the ordered dependency specifiers, and the raw
/// mappings of the wrapped code.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub code: String,
    pub dependencies: Vec<String>,
    pub raw_mappings: Vec<RawMapping>,
    pub line_count: u32,
    pub kind: ModuleKind,
}

#[derive(Debug, Error)]
pub enum TransformError {
    /// An import/require slot used an empty string literal.
    #[error("Empty module specifier in {}", .path.display())]
    EmptySpecifier { path: PathBuf },

    /// The front-end could not make sense of the file.
    #[error("Transform failed for {}: {message}", .path.display())]
    Frontend { path: PathBuf, message: String },

    /// JSON module whose body is not valid JSON.
    #[error("Invalid JSON module {}: {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// The pluggable front-end seam.
///
/// Returns `Ok(None)` when the file kind is deliberately skipped (type-only
/// `.flow` variants). Everything else produces a wrapped module or an error
/// that the graph builder propagates with the offending path attached.
pub trait ModuleTransformer: Send + Sync {
    fn transform(
        &self,
        path: &Path,
        source: &str,
        options: &TransformOptions,
    ) -> Result<Option<TransformOutput>>;
}
