//! Virtual asset modules.
//!
//! Every resolved path with an asset extension becomes a synthesized module
//! that registers the asset's metadata at runtime. The module has exactly
//! one dependency slot: the asset-registry module, resolved through the
//! normal resolver rules by the graph builder.

use std::path::Path;

use sha2::{Digest, Sha256};

use bungae_transform::{count_lines, wrap_module};

/// Synthesized code for one asset module, wrapped and ready for the
/// serializer tail splice.
#[derive(Debug, Clone)]
pub struct AssetSynthesis {
    pub code: String,
    pub line_count: u32,
}

/// Build the `registerAsset` module for an asset file.
///
/// Decoding failures degrade to zero dimensions and a `[1]` scale list; the
/// build continues.
pub fn synthesize_asset_module(path: &Path, root: &Path, dev: bool, registry_specifier: &str) -> AssetSynthesis {
    let (width, height) = match image::image_dimensions(path) {
        Ok((w, h)) => (w, h),
        Err(err) => {
            tracing::warn!(asset = %path.display(), %err, "failed to decode asset dimensions");
            (0, 0)
        }
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("asset");
    let name = strip_scale_suffix(stem).to_string();
    let scales = detect_scales(path, &name, &extension);
    let hash = content_hash(path);

    let relative_dir = path
        .parent()
        .and_then(|dir| dir.strip_prefix(root).ok())
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    let http_server_location = if relative_dir.is_empty() {
        "/assets".to_string()
    } else {
        format!("/assets/{relative_dir}")
    };

    let descriptor = serde_json::json!({
        "__packager_asset": true,
        "httpServerLocation": http_server_location,
        "width": width,
        "height": height,
        "scales": scales,
        "hash": hash,
        "name": name,
        "type": extension,
    });

    let require = if dev {
        format!("_$$_REQUIRE(_dependencyMap[0], \"{registry_specifier}\")")
    } else {
        "_$$_REQUIRE(_dependencyMap[0])".to_string()
    };
    let body = format!("module.exports = {require}.registerAsset({descriptor});");
    let code = wrap_module(&body);
    let line_count = count_lines(&code);

    AssetSynthesis { code, line_count }
}

/// `logo@2x` -> `logo`.
fn strip_scale_suffix(stem: &str) -> &str {
    if let Some(at) = stem.rfind('@') {
        let suffix = &stem[at + 1..];
        if suffix.ends_with('x') && suffix[..suffix.len() - 1].parse::<f64>().is_ok() {
            return &stem[..at];
        }
    }
    stem
}

/// Declared scales: the base file plus any `name@<scale>x.<ext>` siblings,
/// ascending. Falls back to `[1]` when the directory cannot be read.
fn detect_scales(path: &Path, name: &str, extension: &str) -> Vec<serde_json::Value> {
    let mut scales = vec![1.0f64];
    if let Some(dir) = path.parent() {
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                let Some(rest) = file_name.strip_prefix(name) else {
                    continue;
                };
                let Some(scale_part) = rest
                    .strip_prefix('@')
                    .and_then(|r| r.strip_suffix(&format!("x.{extension}")))
                else {
                    continue;
                };
                if let Ok(scale) = scale_part.parse::<f64>() {
                    if !scales.contains(&scale) {
                        scales.push(scale);
                    }
                }
            }
        }
    }
    scales.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    scales
        .into_iter()
        .filter_map(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .collect()
}

fn content_hash(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => {
            let digest = format!("{:x}", Sha256::digest(&bytes));
            digest[..32].to_string()
        }
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Minimal 1x1 transparent PNG.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn test_synthesis_shape() {
        let dir = TempDir::new().unwrap();
        let asset = dir.path().join("img/logo.png");
        std::fs::create_dir_all(asset.parent().unwrap()).unwrap();
        std::fs::write(&asset, TINY_PNG).unwrap();

        let synthesis = synthesize_asset_module(&asset, dir.path(), false, "asset-registry");
        assert!(synthesis.code.starts_with("__d(function ("));
        assert!(synthesis.code.contains(".registerAsset("));
        assert!(synthesis.code.contains("\"httpServerLocation\":\"/assets/img\""));
        assert!(synthesis.code.contains("\"width\":1"));
        assert!(synthesis.code.contains("\"height\":1"));
        assert!(synthesis.code.contains("\"name\":\"logo\""));
        assert!(synthesis.code.contains("\"type\":\"png\""));
        assert!(synthesis.code.contains("_$$_REQUIRE(_dependencyMap[0])"));
    }

    #[test]
    fn test_decode_failure_degrades_to_zero() {
        let dir = TempDir::new().unwrap();
        let asset = dir.path().join("broken.png");
        std::fs::write(&asset, b"not a png").unwrap();

        let synthesis = synthesize_asset_module(&asset, dir.path(), false, "asset-registry");
        assert!(synthesis.code.contains("\"width\":0"));
        assert!(synthesis.code.contains("\"height\":0"));
        assert!(synthesis.code.contains("\"scales\":[1.0]"));
    }

    #[test]
    fn test_scale_siblings_detected() {
        let dir = TempDir::new().unwrap();
        for name in ["icon.png", "icon@2x.png", "icon@3x.png"] {
            std::fs::write(dir.path().join(name), TINY_PNG).unwrap();
        }

        let synthesis =
            synthesize_asset_module(&dir.path().join("icon.png"), dir.path(), false, "registry");
        assert!(synthesis.code.contains("\"scales\":[1.0,2.0,3.0]"));
    }

    #[test]
    fn test_strip_scale_suffix() {
        assert_eq!(strip_scale_suffix("logo@2x"), "logo");
        assert_eq!(strip_scale_suffix("logo@1.5x"), "logo");
        assert_eq!(strip_scale_suffix("logo"), "logo");
        assert_eq!(strip_scale_suffix("user@domain"), "user@domain");
    }
}
