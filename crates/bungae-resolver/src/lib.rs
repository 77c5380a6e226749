//! Platform-aware module resolution.
//!
//! Maps a `(from_path, specifier)` pair to an absolute file path, honoring
//! platform-specific extension variants (`Foo.ios.js`, `Foo.native.js`),
//! asset extensions, `index` files, and `node_modules` package lookup.
//! Resolution failure is a value (`ResolveError::Unresolved`), never a panic:
//! the graph builder decides whether an unresolved slot is fatal.

mod candidates;
mod package;

use std::path::{Path, PathBuf};

use path_clean::PathClean;
use thiserror::Error;

use bungae_config::{BundlerConfig, DevClientHook, Platform};

pub use candidates::extension_candidates;
pub use package::PackageJson;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The specifier could not be mapped to an existing file.
    #[error("Unable to resolve module '{specifier}' from {}", .from.display())]
    Unresolved { specifier: String, from: PathBuf },
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Module resolver for one project configuration.
///
/// The resolver is cheap to clone and holds no per-build state; platform and
/// dev mode are per-call arguments so one resolver serves every session.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    source_exts: Vec<String>,
    asset_exts: Vec<String>,
    prefer_native_platform: bool,
    extra_node_modules: Vec<(String, PathBuf)>,
    dev_client: Option<DevClientHook>,
}

impl Resolver {
    pub fn new(config: &BundlerConfig) -> Self {
        Self {
            root: config.root.clone(),
            source_exts: config.source_exts.clone(),
            asset_exts: config.asset_exts.clone(),
            prefer_native_platform: config.prefer_native_platform,
            extra_node_modules: config
                .extra_node_modules
                .iter()
                .map(|(name, path)| (name.clone(), config.absolute(path)))
                .collect(),
            dev_client: config.dev_client.clone(),
        }
    }

    /// Resolve `specifier` as written in the module at `from`.
    pub fn resolve(
        &self,
        from: &Path,
        specifier: &str,
        platform: Platform,
        dev: bool,
    ) -> Result<PathBuf> {
        let resolved = if specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier == "."
            || specifier == ".."
        {
            let base = from
                .parent()
                .unwrap_or_else(|| Path::new("/"))
                .join(specifier)
                .clean();
            self.resolve_file_or_dir(&base, platform)
        } else if Path::new(specifier).is_absolute() {
            self.resolve_file_or_dir(&PathBuf::from(specifier).clean(), platform)
        } else {
            self.resolve_package(from, specifier, platform)
        };

        match resolved {
            Some(path) => Ok(self.apply_dev_client_hook(path, dev)),
            None => Err(ResolveError::Unresolved {
                specifier: specifier.to_string(),
                from: from.to_path_buf(),
            }),
        }
    }

    /// Probe a base path as a file (extension variants, bare, asset) and
    /// then as a directory with index files.
    fn resolve_file_or_dir(&self, base: &Path, platform: Platform) -> Option<PathBuf> {
        if let Some(hit) = self.resolve_file(base, platform) {
            return Some(hit);
        }
        if base.is_dir() {
            let index = base.join("index");
            return self.probe_extensions(&index, platform);
        }
        None
    }

    fn resolve_file(&self, base: &Path, platform: Platform) -> Option<PathBuf> {
        // Prioritized source-extension probe.
        if let Some(hit) = self.probe_extensions(base, platform) {
            return Some(hit);
        }
        // Bare path covers already-suffixed files and assets.
        if base.is_file() {
            return Some(base.to_path_buf());
        }
        // Configured asset extensions.
        for ext in &self.asset_exts {
            let candidate = append_suffix(base, ext);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    fn probe_extensions(&self, base: &Path, platform: Platform) -> Option<PathBuf> {
        for suffix in extension_candidates(
            platform,
            self.prefer_native_platform,
            &self.source_exts,
        ) {
            let candidate = append_suffix(base, &suffix);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Non-relative specifiers: search the caller's ancestor `node_modules`
    /// directories, the project root, and configured extra package roots.
    fn resolve_package(&self, from: &Path, specifier: &str, platform: Platform) -> Option<PathBuf> {
        for dir in self.package_search_dirs(from, specifier) {
            if let Some(hit) = self.resolve_in_package_dir(&dir, platform) {
                return Some(self.promote_platform_variant(hit, platform));
            }
        }
        None
    }

    fn package_search_dirs(&self, from: &Path, specifier: &str) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        let mut ancestor = from.parent();
        while let Some(dir) = ancestor {
            dirs.push(dir.join("node_modules").join(specifier));
            ancestor = dir.parent();
        }
        let root_candidate = self.root.join("node_modules").join(specifier);
        if !dirs.contains(&root_candidate) {
            dirs.push(root_candidate);
        }
        for (name, mapped) in &self.extra_node_modules {
            if specifier == name {
                dirs.push(mapped.clone());
            } else if let Some(rest) = specifier.strip_prefix(&format!("{name}/")) {
                dirs.push(mapped.join(rest));
            }
        }
        dirs
    }

    /// A package candidate is either a file path inside a package
    /// (`pkg/lib/util`) or a package directory whose manifest names the
    /// entry point.
    fn resolve_in_package_dir(&self, candidate: &Path, platform: Platform) -> Option<PathBuf> {
        if let Some(hit) = self.resolve_file(candidate, platform) {
            return Some(hit);
        }
        if candidate.is_dir() {
            let manifest = candidate.join("package.json");
            if manifest.is_file() {
                if let Some(main) = package::read_main_field(&manifest) {
                    let entry = candidate.join(main).clean();
                    if let Some(hit) = self.resolve_file_or_dir(&entry, platform) {
                        return Some(hit);
                    }
                }
            }
            let index = candidate.join("index");
            return self.probe_extensions(&index, platform);
        }
        None
    }

    /// Promote `Foo.js` to `Foo.ios.js` / `Foo.native.js` when the variant
    /// exists next to a package-resolved file.
    fn promote_platform_variant(&self, resolved: PathBuf, platform: Platform) -> PathBuf {
        if !platform.has_variants() {
            return resolved;
        }
        let Some(ext) = resolved.extension().and_then(|e| e.to_str()) else {
            return resolved;
        };
        let stem = resolved.with_extension("");
        let platform_variant = append_suffix(&stem, &format!("{}.{ext}", platform.as_str()));
        if platform_variant.is_file() {
            return platform_variant;
        }
        if self.prefer_native_platform {
            let native_variant = append_suffix(&stem, &format!("native.{ext}"));
            if native_variant.is_file() {
                return native_variant;
            }
        }
        resolved
    }

    fn apply_dev_client_hook(&self, resolved: PathBuf, dev: bool) -> PathBuf {
        if !dev {
            return resolved;
        }
        let Some(hook) = &self.dev_client else {
            return resolved;
        };
        if resolved.to_string_lossy().ends_with(&hook.replaces) {
            let replacement = if hook.replacement.is_absolute() {
                hook.replacement.clone()
            } else {
                self.root.join(&hook.replacement)
            };
            tracing::debug!(
                from = %resolved.display(),
                to = %replacement.display(),
                "dev-client hook applied"
            );
            return replacement;
        }
        resolved
    }
}

/// Append `.{suffix}` without `Path::with_extension` semantics, which would
/// clobber an existing extension.
fn append_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bungae_config::BundlerConfig;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[&str]) -> (TempDir, Resolver) {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "// fixture").unwrap();
        }
        let config = BundlerConfig::new(dir.path().to_path_buf());
        let resolver = Resolver::new(&config);
        (dir, resolver)
    }

    #[test]
    fn test_relative_plain_extension() {
        let (dir, resolver) = project(&["index.js", "Foo.js"]);
        let from = dir.path().join("index.js");
        let resolved = resolver.resolve(&from, "./Foo", Platform::Ios, true).unwrap();
        assert_eq!(resolved, dir.path().join("Foo.js"));
    }

    #[test]
    fn test_platform_variant_beats_plain() {
        let (dir, resolver) = project(&[
            "index.js",
            "Platform.js",
            "Platform.ios.js",
            "Platform.android.js",
        ]);
        let from = dir.path().join("index.js");

        let ios = resolver
            .resolve(&from, "./Platform", Platform::Ios, true)
            .unwrap();
        assert_eq!(ios, dir.path().join("Platform.ios.js"));

        let android = resolver
            .resolve(&from, "./Platform", Platform::Android, true)
            .unwrap();
        assert_eq!(android, dir.path().join("Platform.android.js"));

        let web = resolver
            .resolve(&from, "./Platform", Platform::Web, true)
            .unwrap();
        assert_eq!(web, dir.path().join("Platform.js"));
    }

    #[test]
    fn test_native_variant_off_web() {
        let (dir, resolver) = project(&["index.js", "Device.js", "Device.native.js"]);
        let from = dir.path().join("index.js");

        let ios = resolver
            .resolve(&from, "./Device", Platform::Ios, true)
            .unwrap();
        assert_eq!(ios, dir.path().join("Device.native.js"));

        let web = resolver
            .resolve(&from, "./Device", Platform::Web, true)
            .unwrap();
        assert_eq!(web, dir.path().join("Device.js"));
    }

    #[test]
    fn test_already_suffixed_specifier() {
        let (dir, resolver) = project(&["index.js", "Bar.js"]);
        let from = dir.path().join("index.js");
        let resolved = resolver
            .resolve(&from, "./Bar.js", Platform::Ios, true)
            .unwrap();
        assert_eq!(resolved, dir.path().join("Bar.js"));
    }

    #[test]
    fn test_asset_extension() {
        let (dir, resolver) = project(&["index.js", "logo.png"]);
        let from = dir.path().join("index.js");
        let resolved = resolver
            .resolve(&from, "./logo.png", Platform::Ios, true)
            .unwrap();
        assert_eq!(resolved, dir.path().join("logo.png"));
    }

    #[test]
    fn test_index_file() {
        let (dir, resolver) = project(&["index.js", "components/index.ts"]);
        let from = dir.path().join("index.js");
        let resolved = resolver
            .resolve(&from, "./components", Platform::Ios, true)
            .unwrap();
        assert_eq!(resolved, dir.path().join("components/index.ts"));
    }

    #[test]
    fn test_package_main_field() {
        let (dir, resolver) = project(&["src/App.js", "node_modules/leftpad/lib/main.js"]);
        fs::write(
            dir.path().join("node_modules/leftpad/package.json"),
            r#"{"name": "leftpad", "main": "lib/main.js"}"#,
        )
        .unwrap();

        let from = dir.path().join("src/App.js");
        let resolved = resolver
            .resolve(&from, "leftpad", Platform::Ios, true)
            .unwrap();
        assert_eq!(resolved, dir.path().join("node_modules/leftpad/lib/main.js"));
    }

    #[test]
    fn test_package_subpath() {
        let (dir, resolver) = project(&["src/App.js", "node_modules/pkg/util/math.js"]);
        let from = dir.path().join("src/App.js");
        let resolved = resolver
            .resolve(&from, "pkg/util/math", Platform::Ios, true)
            .unwrap();
        assert_eq!(resolved, dir.path().join("node_modules/pkg/util/math.js"));
    }

    #[test]
    fn test_package_platform_promotion() {
        let (dir, resolver) = project(&[
            "src/App.js",
            "node_modules/widgets/Button.js",
            "node_modules/widgets/Button.ios.js",
        ]);
        fs::write(
            dir.path().join("node_modules/widgets/package.json"),
            r#"{"name": "widgets", "main": "Button.js"}"#,
        )
        .unwrap();

        let from = dir.path().join("src/App.js");
        let resolved = resolver
            .resolve(&from, "widgets", Platform::Ios, true)
            .unwrap();
        assert_eq!(
            resolved,
            dir.path().join("node_modules/widgets/Button.ios.js")
        );
    }

    #[test]
    fn test_extra_node_modules() {
        let dir = TempDir::new().unwrap();
        let shared = dir.path().join("shared-lib");
        fs::create_dir_all(&shared).unwrap();
        fs::write(shared.join("index.js"), "// shared").unwrap();
        fs::create_dir_all(dir.path().join("app/src")).unwrap();
        fs::write(dir.path().join("app/src/App.js"), "// app").unwrap();

        let mut config = BundlerConfig::new(dir.path().join("app"));
        config
            .extra_node_modules
            .insert("shared".to_string(), shared.clone());
        let resolver = Resolver::new(&config);

        let from = dir.path().join("app/src/App.js");
        let resolved = resolver
            .resolve(&from, "shared", Platform::Ios, true)
            .unwrap();
        assert_eq!(resolved, shared.join("index.js"));
    }

    #[test]
    fn test_unresolved_is_error_not_panic() {
        let (dir, resolver) = project(&["index.js"]);
        let from = dir.path().join("index.js");
        let err = resolver
            .resolve(&from, "./does-not-exist", Platform::Ios, true)
            .unwrap_err();
        assert!(err.to_string().contains("does-not-exist"));
    }

    #[test]
    fn test_dev_client_hook() {
        let (dir, _) = project(&["index.js", "vendor/HMRClient.js", "dev/client.js"]);
        let mut config = BundlerConfig::new(dir.path().to_path_buf());
        config.dev_client = Some(DevClientHook {
            replaces: "vendor/HMRClient.js".to_string(),
            replacement: PathBuf::from("dev/client.js"),
        });
        let resolver = Resolver::new(&config);
        let from = dir.path().join("index.js");

        let dev_resolved = resolver
            .resolve(&from, "./vendor/HMRClient.js", Platform::Ios, true)
            .unwrap();
        assert_eq!(dev_resolved, dir.path().join("dev/client.js"));

        let prod_resolved = resolver
            .resolve(&from, "./vendor/HMRClient.js", Platform::Ios, false)
            .unwrap();
        assert_eq!(prod_resolved, dir.path().join("vendor/HMRClient.js"));
    }
}
