//! Package manifest (`package.json`) entry-point resolution.

use std::path::Path;

use serde::Deserialize;

/// The subset of `package.json` the resolver cares about.
#[derive(Debug, Deserialize)]
pub struct PackageJson {
    pub name: Option<String>,
    #[serde(rename = "react-native")]
    pub react_native: Option<serde_json::Value>,
    pub browser: Option<serde_json::Value>,
    pub main: Option<String>,
}

/// Read the entry-point field from a manifest.
///
/// Field priority mirrors mobile-first bundlers: `react-native`, `browser`,
/// `main`. Object-valued `react-native`/`browser` fields (file remapping
/// tables) are skipped; only string values name an entry point. A missing or
/// unparsable manifest yields `None` and the caller falls through to
/// `index` resolution.
pub fn read_main_field(manifest: &Path) -> Option<String> {
    let content = std::fs::read_to_string(manifest).ok()?;
    let package: PackageJson = match serde_json::from_str(&content) {
        Ok(package) => package,
        Err(err) => {
            tracing::warn!(manifest = %manifest.display(), %err, "ignoring malformed package.json");
            return None;
        }
    };

    for field in [&package.react_native, &package.browser] {
        if let Some(serde_json::Value::String(path)) = field {
            return Some(path.clone());
        }
    }
    package.main
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn manifest(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("package.json");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_main_field() {
        let (_dir, path) = manifest(r#"{"name": "a", "main": "lib/index.js"}"#);
        assert_eq!(read_main_field(&path), Some("lib/index.js".to_string()));
    }

    #[test]
    fn test_react_native_field_wins() {
        let (_dir, path) = manifest(
            r#"{"name": "a", "main": "lib/index.js", "react-native": "src/index.native.js"}"#,
        );
        assert_eq!(
            read_main_field(&path),
            Some("src/index.native.js".to_string())
        );
    }

    #[test]
    fn test_object_valued_browser_field_skipped() {
        let (_dir, path) = manifest(
            r#"{"name": "a", "main": "lib/index.js", "browser": {"./fs": false}}"#,
        );
        assert_eq!(read_main_field(&path), Some("lib/index.js".to_string()));
    }

    #[test]
    fn test_malformed_manifest() {
        let (_dir, path) = manifest("{not json");
        assert_eq!(read_main_field(&path), None);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_main_field(&dir.path().join("package.json")), None);
    }
}
