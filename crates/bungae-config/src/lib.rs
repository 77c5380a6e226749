//! Configuration layer for the Bungae bundler.
//!
//! Provides the [`BundlerConfig`] loaded from `bungae.config.json` (merged
//! with `BUNGAE_*` environment variables), the [`BundleParams`] tuple that
//! identifies a build session, and upward config-file discovery for CLI use.

mod config;
mod discovery;
mod error;
mod params;

pub use config::{BundlerConfig, DevClientHook};
pub use discovery::ConfigDiscovery;
pub use error::{ConfigError, Result};
pub use params::{BundleParams, Platform, SourcePathMode};
