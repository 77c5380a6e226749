//! Source-map composition.
//!
//! Merges per-module raw mappings into one bundle-level map. Each module's
//! mappings use generated lines starting at 1 inside its own block; the
//! compositor shifts them onto the bundle line counter, inserting empty-line
//! separators so that consecutive modules line up with the serializer's
//! newline-joined concatenation.

pub mod consumer;
mod vlq;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use bungae_transform::RawMapping;

pub use consumer::{OriginalPosition, SourceMapConsumer};

/// One module's contribution to the bundle map.
#[derive(Debug, Clone)]
pub struct ModuleMapInput {
    /// The `sources` entry for this module (virtual root or absolute path).
    pub source_name: String,
    pub raw_mappings: Vec<RawMapping>,
    /// Original source text; `None` when sources content is excluded.
    pub source_content: Option<String>,
    /// Authoritative wrapped line count; overrides any recount.
    pub line_count: u32,
    pub is_ignored: bool,
}

/// An indexed source map, `version` 3, `file` omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMap {
    pub version: u32,
    pub sources: Vec<String>,
    #[serde(rename = "sourcesContent", skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    pub names: Vec<String>,
    pub mappings: String,
    #[serde(rename = "x_google_ignoreList", skip_serializing_if = "Vec::is_empty", default)]
    pub x_google_ignore_list: Vec<u32>,
}

impl SourceMap {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Compose the bundle map.
///
/// `skip_lines` counts prepend content that contributes no real mappings;
/// the first module's block starts on the line after it.
pub fn compose(skip_lines: u32, inputs: &[ModuleMapInput], exclude_source: bool) -> SourceMap {
    let mut mappings = String::new();
    let mut names: IndexSet<String> = IndexSet::new();

    // Persistent VLQ deltas across the whole map.
    let mut current_line: u32 = 1;
    let mut last_generated_column: i64 = 0;
    let mut last_source_index: i64 = 0;
    let mut last_source_line: i64 = 0;
    let mut last_source_column: i64 = 0;
    let mut last_name_index: i64 = 0;
    let mut segment_on_line = false;

    let mut block_start = skip_lines + 1;

    for (source_index, input) in inputs.iter().enumerate() {
        for mapping in &input.raw_mappings {
            let absolute_line = block_start + mapping.generated_line - 1;
            while current_line < absolute_line {
                mappings.push(';');
                current_line += 1;
                last_generated_column = 0;
                segment_on_line = false;
            }
            if segment_on_line {
                mappings.push(',');
            }
            segment_on_line = true;

            let generated_column = i64::from(mapping.generated_column);
            vlq::encode(generated_column - last_generated_column, &mut mappings);
            last_generated_column = generated_column;

            if let (Some(source_line), Some(source_column)) =
                (mapping.source_line, mapping.source_column)
            {
                vlq::encode(source_index as i64 - last_source_index, &mut mappings);
                last_source_index = source_index as i64;

                // Raw mappings are 1-based; the encoded form is 0-based.
                let source_line = i64::from(source_line) - 1;
                vlq::encode(source_line - last_source_line, &mut mappings);
                last_source_line = source_line;

                let source_column = i64::from(source_column);
                vlq::encode(source_column - last_source_column, &mut mappings);
                last_source_column = source_column;

                if let Some(name) = &mapping.name {
                    let (name_index, _) = names.insert_full(name.clone());
                    vlq::encode(name_index as i64 - last_name_index, &mut mappings);
                    last_name_index = name_index as i64;
                }
            }
        }
        block_start += input.line_count;
    }

    let sources_content = if exclude_source {
        None
    } else {
        Some(inputs.iter().map(|i| i.source_content.clone()).collect())
    };

    SourceMap {
        version: 3,
        sources: inputs.iter().map(|i| i.source_name.clone()).collect(),
        sources_content,
        names: names.into_iter().collect(),
        mappings,
        x_google_ignore_list: inputs
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_ignored)
            .map(|(idx, _)| idx as u32)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, mappings: Vec<RawMapping>, line_count: u32) -> ModuleMapInput {
        ModuleMapInput {
            source_name: name.to_string(),
            raw_mappings: mappings,
            source_content: Some(format!("// {name}")),
            line_count,
            is_ignored: false,
        }
    }

    #[test]
    fn test_single_module() {
        // Module block: header line, one body line, footer. Body line 2 maps
        // to source line 1.
        let map = compose(
            0,
            &[input("/app/a.js", vec![RawMapping::source(2, 0, 1, 0)], 3)],
            false,
        );
        assert_eq!(map.version, 3);
        assert_eq!(map.sources, vec!["/app/a.js"]);
        // One empty line, then the segment [0, 0, 0, 0].
        assert_eq!(map.mappings, ";AAAA");
    }

    #[test]
    fn test_skip_lines_shift() {
        let map = compose(
            2,
            &[input("/app/a.js", vec![RawMapping::source(2, 0, 1, 0)], 3)],
            false,
        );
        // Two prepend lines + the wrapper header before the first segment.
        assert_eq!(map.mappings, ";;;AAAA");
    }

    #[test]
    fn test_carry_over_between_modules() {
        // First module spans 3 lines with a mapping on line 2; the second
        // module's line-2 mapping must land on bundle line 5.
        let map = compose(
            0,
            &[
                input("/app/a.js", vec![RawMapping::source(2, 0, 1, 0)], 3),
                input("/app/b.js", vec![RawMapping::source(2, 0, 1, 0)], 3),
            ],
            false,
        );
        let lines: Vec<&str> = map.mappings.split(';').collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "AAAA");
        assert!(lines[2].is_empty());
        assert!(lines[3].is_empty());
        // Source index advances by one, line delta rewinds to source line 1.
        assert_eq!(lines[4], "ACAA");
    }

    #[test]
    fn test_names_collected_and_deduped() {
        let map = compose(
            0,
            &[input(
                "/app/a.js",
                vec![
                    RawMapping::named(2, 0, 1, 0, "foo"),
                    RawMapping::named(3, 0, 2, 0, "bar"),
                    RawMapping::named(4, 0, 3, 0, "foo"),
                ],
                5,
            )],
            false,
        );
        assert_eq!(map.names, vec!["foo", "bar"]);
    }

    #[test]
    fn test_ignore_list() {
        let mut ignored = input("/app/node_modules/x/i.js", vec![], 3);
        ignored.is_ignored = true;
        let map = compose(0, &[input("/app/a.js", vec![], 3), ignored], false);
        assert_eq!(map.x_google_ignore_list, vec![1]);
    }

    #[test]
    fn test_exclude_source() {
        let map = compose(0, &[input("/app/a.js", vec![], 3)], true);
        assert!(map.sources_content.is_none());
        let json = map.to_json().unwrap();
        assert!(!json.contains("sourcesContent"));
    }

    #[test]
    fn test_terminating_mapping_encoded_without_source() {
        let map = compose(
            0,
            &[input(
                "/app/a.js",
                vec![RawMapping::source(2, 0, 1, 0), RawMapping::generated(3, 2)],
                3,
            )],
            false,
        );
        let lines: Vec<&str> = map.mappings.split(';').collect();
        // Terminator is a single-field segment (generated column only).
        assert_eq!(lines[2], "E");
    }
}
