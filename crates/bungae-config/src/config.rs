//! The bundler configuration structure and its defaults.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default maximum age of a transform-cache entry: seven days.
const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// Replaces a well-known module with the bundler's own development client
/// when resolving in dev mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevClientHook {
    /// Suffix of the resolved path to replace (e.g. `Libraries/Utilities/HMRClient.js`).
    pub replaces: String,
    /// Absolute or root-relative path of the replacement module.
    #[serde(rename = "with")]
    pub replacement: PathBuf,
}

/// Full bundler configuration, loadable from `bungae.config.json`.
///
/// Unknown fields are rejected so that typos surface as ConfigInvalid at
/// startup instead of being silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BundlerConfig {
    /// Project root. All relative paths in the config resolve against it.
    pub root: PathBuf,

    /// Default entry point, relative to the root.
    #[serde(default = "default_entry")]
    pub entry: PathBuf,

    /// Source extensions probed by the resolver, in priority order.
    #[serde(default = "default_source_exts")]
    pub source_exts: Vec<String>,

    /// Extensions treated as binary assets.
    #[serde(default = "default_asset_exts")]
    pub asset_exts: Vec<String>,

    /// Probe `.native.<ext>` variants before plain extensions off-web.
    #[serde(default = "default_true")]
    pub prefer_native_platform: bool,

    /// Extra package roots: name prefix -> directory.
    #[serde(default)]
    pub extra_node_modules: IndexMap<String, PathBuf>,

    /// Additional directories watched and served besides the root.
    #[serde(default)]
    pub watch_folders: Vec<PathBuf>,

    /// Platform polyfills, prepended as script modules after the runtime.
    #[serde(default)]
    pub polyfills: Vec<PathBuf>,

    /// Extra globals declared by the prelude, name -> JSON literal.
    #[serde(default)]
    pub extra_globals: IndexMap<String, serde_json::Value>,

    /// Patterns the runtime ignores when warning about require cycles.
    #[serde(default)]
    pub require_cycle_ignore_patterns: Vec<String>,

    /// Specifier of the module that registers assets at runtime.
    #[serde(default = "default_asset_registry")]
    pub asset_registry_path: String,

    /// Dev-client replacement hook applied by the resolver in dev mode.
    #[serde(default)]
    pub dev_client: Option<DevClientHook>,

    /// Transform cache directory. Defaults to `<root>/.bungae-cache`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum age of a transform-cache entry in seconds.
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,

    /// Forwarded to the transform pipeline and mixed into cache keys.
    #[serde(default)]
    pub inline_requires: bool,

    /// Dev server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Dev server bind address.
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_entry() -> PathBuf {
    PathBuf::from("index.js")
}

fn default_source_exts() -> Vec<String> {
    ["js", "jsx", "ts", "tsx", "mjs", "cjs", "json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_asset_exts() -> Vec<String> {
    [
        "png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "ttf", "otf", "mp3", "mp4", "webm",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_asset_registry() -> String {
    "@react-native/assets-registry/registry".to_string()
}

fn default_cache_max_age() -> u64 {
    DEFAULT_CACHE_MAX_AGE_SECS
}

fn default_port() -> u16 {
    8081
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

impl BundlerConfig {
    /// Create a config with defaults for the given project root.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            entry: default_entry(),
            source_exts: default_source_exts(),
            asset_exts: default_asset_exts(),
            prefer_native_platform: true,
            extra_node_modules: IndexMap::new(),
            watch_folders: Vec::new(),
            polyfills: Vec::new(),
            extra_globals: IndexMap::new(),
            require_cycle_ignore_patterns: Vec::new(),
            asset_registry_path: default_asset_registry(),
            dev_client: None,
            cache_dir: None,
            cache_max_age_secs: default_cache_max_age(),
            inline_requires: false,
            port: default_port(),
            host: default_host(),
        }
    }

    /// Load configuration by layering defaults, a JSON config file, and
    /// `BUNGAE_*` environment variables (highest precedence).
    pub fn load(root: &Path, config_file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::new(root.to_path_buf())));
        if let Some(path) = config_file {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            figment = figment.merge(Json::file(path));
        }
        figment = figment.merge(Env::prefixed("BUNGAE_"));

        let mut config: Self = figment.extract()?;
        // The root from the config file may itself be relative; anchor it.
        if config.root.is_relative() {
            config.root = root.join(&config.root);
        }
        config.validate()?;
        Ok(config)
    }

    /// Semantic validation beyond what serde enforces structurally.
    pub fn validate(&self) -> Result<()> {
        if self.source_exts.is_empty() {
            return Err(ConfigError::InvalidField {
                field: "sourceExts".to_string(),
                received: "[]".to_string(),
                hint: "at least one source extension is required".to_string(),
            });
        }
        for ext in self.source_exts.iter().chain(self.asset_exts.iter()) {
            if ext.starts_with('.') || ext.contains('/') {
                return Err(ConfigError::InvalidField {
                    field: "sourceExts/assetExts".to_string(),
                    received: format!("\"{ext}\""),
                    hint: "extensions are bare suffixes without a leading dot".to_string(),
                });
            }
        }
        if self.cache_max_age_secs == 0 {
            return Err(ConfigError::InvalidField {
                field: "cacheMaxAgeSecs".to_string(),
                received: "0".to_string(),
                hint: "must be positive; omit the field for the 7-day default".to_string(),
            });
        }
        for name in self.extra_globals.keys() {
            let valid = !name.is_empty()
                && name
                    .chars()
                    .enumerate()
                    .all(|(i, c)| c == '_' || c == '$' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
            if !valid {
                return Err(ConfigError::InvalidField {
                    field: "extraGlobals".to_string(),
                    received: format!("\"{name}\""),
                    hint: "global names must be valid JavaScript identifiers".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resolve a config-relative path against the project root.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// The transform cache directory, defaulted under the root.
    pub fn cache_dir(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => self.absolute(dir),
            None => self.root.join(".bungae-cache"),
        }
    }

    /// Entry point as an absolute path.
    pub fn entry_path(&self) -> PathBuf {
        self.absolute(&self.entry)
    }
}
