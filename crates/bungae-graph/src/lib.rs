//! Dependency graph construction for the Bungae bundler.
//!
//! Orchestrates resolution, transformation, and dependency extraction into a
//! module map with inverse-dependency links, produces the canonical DFS
//! post-order, allocates session-stable module ids, and recomputes minimal
//! graph transitions after file changes.

mod assets;
mod builder;
mod delta;
mod error;
mod graph;
mod ids;
mod module;
mod order;
mod progress;

pub use assets::synthesize_asset_module;
pub use builder::{BuildOptions, GraphBuilder};
pub use delta::{compute_delta, module_hash, DeltaResult};
pub use error::{GraphError, Result};
pub use graph::Graph;
pub use ids::IdAllocator;
pub use module::{Dependency, Module};
pub use order::post_order;
pub use progress::{CountingObserver, NullObserver, ProgressObserver};

pub use bungae_transform::ModuleKind;
