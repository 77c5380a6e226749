//! Per-request bundle parameters.
//!
//! [`BundleParams`] is the configuration tuple that identifies a build
//! session: two requests with equal params share one session, its module-id
//! allocator, and its cached graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Target platform for a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    /// The extension infix used by platform-specific file variants
    /// (`Foo.ios.js`, `Foo.android.js`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }

    /// Platform variants are only probed off-web; web bundles resolve plain
    /// extensions directly.
    pub fn has_variants(&self) -> bool {
        !matches!(self, Platform::Web)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "web" => Ok(Platform::Web),
            other => Err(ConfigError::InvalidField {
                field: "platform".to_string(),
                received: format!("\"{other}\""),
                hint: "expected one of: ios, android, web".to_string(),
            }),
        }
    }
}

/// How `sources` entries of emitted source maps are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourcePathMode {
    /// Absolute filesystem paths.
    Absolute,
    /// Server-relative virtual roots (`/[project]/…`, `/[watch-folders]/N/…`).
    #[default]
    UrlServer,
}

impl FromStr for SourcePathMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absolute" => Ok(SourcePathMode::Absolute),
            "url-server" => Ok(SourcePathMode::UrlServer),
            other => Err(ConfigError::InvalidField {
                field: "sourcePaths".to_string(),
                received: format!("\"{other}\""),
                hint: "expected \"absolute\" or \"url-server\"".to_string(),
            }),
        }
    }
}

/// The session-identifying configuration tuple.
///
/// Everything that changes bundle bytes or module identity is part of this
/// key; request-level toggles that only affect delivery (e.g. inline source
/// maps) deliberately are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BundleParams {
    pub platform: Platform,
    pub dev: bool,
    pub minify: bool,
    pub source_paths: SourcePathMode,
    pub run_module: bool,
    pub modules_only: bool,
    pub exclude_source: bool,
}

impl BundleParams {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            dev: true,
            minify: false,
            source_paths: SourcePathMode::default(),
            run_module: true,
            modules_only: false,
            exclude_source: false,
        }
    }

    pub fn dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    pub fn minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(params: &BundleParams) -> u64 {
        let mut hasher = DefaultHasher::new();
        params.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_platform_parsing() {
        assert_eq!("ios".parse::<Platform>().unwrap(), Platform::Ios);
        assert_eq!("android".parse::<Platform>().unwrap(), Platform::Android);
        assert_eq!("web".parse::<Platform>().unwrap(), Platform::Web);
        assert!("macos".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_variants() {
        assert!(Platform::Ios.has_variants());
        assert!(Platform::Android.has_variants());
        assert!(!Platform::Web.has_variants());
    }

    #[test]
    fn test_source_path_mode_parsing() {
        assert_eq!(
            "absolute".parse::<SourcePathMode>().unwrap(),
            SourcePathMode::Absolute
        );
        assert_eq!(
            "url-server".parse::<SourcePathMode>().unwrap(),
            SourcePathMode::UrlServer
        );
        assert!("relative".parse::<SourcePathMode>().is_err());
    }

    #[test]
    fn test_params_identity() {
        let a = BundleParams::new(Platform::Ios).dev(true);
        let b = BundleParams::new(Platform::Ios).dev(true);
        let c = BundleParams::new(Platform::Ios).dev(false);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
    }
}
