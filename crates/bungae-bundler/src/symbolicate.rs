//! Stack-frame symbolication.
//!
//! Maps frames from bundle coordinates back to original sources using a
//! session's composed map, translates virtual source roots back to local
//! filesystem paths, and slices a small code frame around the target.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bungae_config::BundlerConfig;

use crate::sourcemap::SourceMapConsumer;

/// A stack frame as reported by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFrame {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(rename = "lineNumber", default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(rename = "methodName", default)]
    pub method_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeFrame {
    pub content: String,
    pub location: CodeFrameLocation,
    #[serde(rename = "fileName")]
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeFrameLocation {
    pub row: u32,
    pub column: u32,
}

/// Symbolicate one frame against a bundle map. Frames that do not resolve
/// (native frames, positions outside any module block) pass through
/// unchanged.
pub fn symbolicate_frame(
    consumer: &SourceMapConsumer,
    frame: &StackFrame,
    config: &BundlerConfig,
) -> StackFrame {
    let (Some(line), Some(column)) = (frame.line_number, frame.column) else {
        return frame.clone();
    };
    let Some(original) = consumer.lookup(line, column) else {
        return frame.clone();
    };
    let file = translate_virtual_source(&original.source, config);
    StackFrame {
        file: Some(file.to_string_lossy().into_owned()),
        line_number: Some(original.line),
        column: Some(original.column),
        method_name: original.name.or_else(|| frame.method_name.clone()),
    }
}

/// Translate a virtual source root back to an absolute local path.
///
/// `/[project]/…` resolves against the project root and
/// `/[watch-folders]/N/…` against the N-th configured watch folder;
/// anything else is taken as a filesystem path already.
pub fn translate_virtual_source(source: &str, config: &BundlerConfig) -> PathBuf {
    if let Some(rel) = source.strip_prefix("/[project]/") {
        return config.root.join(rel);
    }
    if let Some(rest) = source.strip_prefix("/[watch-folders]/") {
        if let Some((index, rel)) = rest.split_once('/') {
            if let Ok(index) = index.parse::<usize>() {
                if let Some(folder) = config.watch_folders.get(index) {
                    return config.absolute(folder).join(rel);
                }
            }
        }
    }
    PathBuf::from(source)
}

/// Slice a ±2-line text frame around the target position, or `None` when
/// the file cannot be read.
pub fn code_frame(path: &Path, line: u32, column: u32) -> Option<CodeFrame> {
    let content = std::fs::read_to_string(path).ok()?;
    let lines: Vec<&str> = content.lines().collect();
    if line == 0 || line as usize > lines.len() {
        return None;
    }
    let index = line as usize - 1;
    let start = index.saturating_sub(2);
    let end = (index + 3).min(lines.len());
    Some(CodeFrame {
        content: lines[start..end].join("\n"),
        location: CodeFrameLocation { row: line, column },
        file_name: path.to_string_lossy().into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::{compose, ModuleMapInput};
    use bungae_transform::RawMapping;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn consumer_for(source_name: &str) -> SourceMapConsumer {
        let map = compose(
            0,
            &[ModuleMapInput {
                source_name: source_name.to_string(),
                raw_mappings: vec![
                    RawMapping::source(2, 0, 1, 0),
                    RawMapping::named(3, 0, 2, 0, "boom"),
                    RawMapping::generated(4, 2),
                ],
                source_content: Some("const x = 1;\nthrow new Error('boom');".to_string()),
                line_count: 4,
                is_ignored: false,
            }],
            false,
        );
        SourceMapConsumer::parse(&map.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_round_trip_frame() {
        let config = BundlerConfig::new(PathBuf::from("/app"));
        let consumer = consumer_for("/[project]/src/crash.js");
        let frame = StackFrame {
            file: Some("http://localhost:8081/index.bundle?platform=ios".to_string()),
            line_number: Some(3),
            column: Some(5),
            method_name: Some("anonymous".to_string()),
        };

        let resolved = symbolicate_frame(&consumer, &frame, &config);
        assert_eq!(resolved.file.as_deref(), Some("/app/src/crash.js"));
        assert_eq!(resolved.line_number, Some(2));
        assert_eq!(resolved.column, Some(0));
        assert_eq!(resolved.method_name.as_deref(), Some("boom"));
    }

    #[test]
    fn test_unmapped_frame_passes_through() {
        let config = BundlerConfig::new(PathBuf::from("/app"));
        let consumer = consumer_for("/[project]/src/crash.js");
        let frame = StackFrame {
            file: Some("[native code]".to_string()),
            line_number: None,
            column: None,
            method_name: Some("apply".to_string()),
        };
        let resolved = symbolicate_frame(&consumer, &frame, &config);
        assert_eq!(resolved.file.as_deref(), Some("[native code]"));
    }

    #[test]
    fn test_translate_virtual_roots() {
        let mut config = BundlerConfig::new(PathBuf::from("/app"));
        config.watch_folders.push(PathBuf::from("/shared"));

        assert_eq!(
            translate_virtual_source("/[project]/src/a.js", &config),
            PathBuf::from("/app/src/a.js")
        );
        assert_eq!(
            translate_virtual_source("/[watch-folders]/0/lib/b.js", &config),
            PathBuf::from("/shared/lib/b.js")
        );
        assert_eq!(
            translate_virtual_source("/abs/elsewhere.js", &config),
            PathBuf::from("/abs/elsewhere.js")
        );
    }

    #[test]
    fn test_code_frame_window() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crash.js");
        std::fs::write(&path, "l1\nl2\nl3\nl4\nl5\nl6").unwrap();

        let frame = code_frame(&path, 4, 7).unwrap();
        assert_eq!(frame.content, "l2\nl3\nl4\nl5\nl6");
        assert_eq!(frame.location.row, 4);
        assert_eq!(frame.location.column, 7);

        let at_start = code_frame(&path, 1, 0).unwrap();
        assert_eq!(at_start.content, "l1\nl2\nl3");
    }

    #[test]
    fn test_code_frame_unreadable_file() {
        assert!(code_frame(Path::new("/definitely/missing.js"), 1, 0).is_none());
    }
}
