//! Source-map consumer for symbolication.
//!
//! Parses a composed map back into a flat, ordered mapping list and answers
//! greatest-lower-bound lookups from bundle coordinates. Mappings without a
//! source field (the per-module terminators) resolve to nothing, so lookups
//! past the end of a module do not alias its final real mapping.

use serde::Deserialize;

use super::vlq;

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("invalid source map JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported source map version {0}")]
    Version(u32),

    #[error("malformed VLQ segment at line {line}")]
    Segment { line: u32 },
}

#[derive(Debug, Deserialize)]
struct RawMap {
    version: u32,
    sources: Vec<String>,
    #[serde(rename = "sourcesContent", default)]
    sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    names: Vec<String>,
    mappings: String,
}

/// A decoded mapping in absolute bundle coordinates (1-based lines).
#[derive(Debug, Clone, PartialEq)]
struct Mapping {
    generated_line: u32,
    generated_column: u32,
    source: Option<SourceRef>,
}

#[derive(Debug, Clone, PartialEq)]
struct SourceRef {
    source_index: u32,
    line: u32,
    column: u32,
    name_index: Option<u32>,
}

/// Result of a lookup, in original-source coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalPosition {
    pub source: String,
    pub line: u32,
    pub column: u32,
    pub name: Option<String>,
}

#[derive(Debug)]
pub struct SourceMapConsumer {
    sources: Vec<String>,
    sources_content: Option<Vec<Option<String>>>,
    names: Vec<String>,
    mappings: Vec<Mapping>,
}

impl SourceMapConsumer {
    pub fn parse(json: &str) -> Result<Self, ConsumerError> {
        let raw: RawMap = serde_json::from_str(json)?;
        if raw.version != 3 {
            return Err(ConsumerError::Version(raw.version));
        }

        let mut mappings = Vec::new();
        let mut source_index: i64 = 0;
        let mut source_line: i64 = 0;
        let mut source_column: i64 = 0;
        let mut name_index: i64 = 0;

        for (line_offset, line) in raw.mappings.split(';').enumerate() {
            let generated_line = line_offset as u32 + 1;
            let mut generated_column: i64 = 0;
            if line.is_empty() {
                continue;
            }
            for segment in line.split(',') {
                let values = vlq::decode_segment(segment).ok_or(ConsumerError::Segment {
                    line: generated_line,
                })?;
                match values.len() {
                    1 | 4 | 5 => {}
                    _ => {
                        return Err(ConsumerError::Segment {
                            line: generated_line,
                        })
                    }
                }
                generated_column += values[0];
                let source = if values.len() >= 4 {
                    source_index += values[1];
                    source_line += values[2];
                    source_column += values[3];
                    let name = if values.len() == 5 {
                        name_index += values[4];
                        Some(name_index as u32)
                    } else {
                        None
                    };
                    Some(SourceRef {
                        source_index: source_index as u32,
                        line: source_line as u32 + 1,
                        column: source_column as u32,
                        name_index: name,
                    })
                } else {
                    None
                };
                mappings.push(Mapping {
                    generated_line,
                    generated_column: generated_column as u32,
                    source,
                });
            }
        }

        Ok(Self {
            sources: raw.sources,
            sources_content: raw.sources_content,
            names: raw.names,
            mappings,
        })
    }

    /// Greatest mapping at or before `(line, column)` (1-based line).
    /// Returns `None` when that mapping carries no source.
    pub fn lookup(&self, line: u32, column: u32) -> Option<OriginalPosition> {
        let probe = (line, column);
        let index = self
            .mappings
            .partition_point(|m| (m.generated_line, m.generated_column) <= probe);
        let mapping = self.mappings.get(index.checked_sub(1)?)?;
        let source_ref = mapping.source.as_ref()?;
        Some(OriginalPosition {
            source: self
                .sources
                .get(source_ref.source_index as usize)?
                .clone(),
            line: source_ref.line,
            column: source_ref.column,
            name: source_ref
                .name_index
                .and_then(|i| self.names.get(i as usize))
                .cloned(),
        })
    }

    pub fn source_content(&self, source: &str) -> Option<&str> {
        let index = self.sources.iter().position(|s| s == source)?;
        self.sources_content
            .as_ref()?
            .get(index)?
            .as_deref()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}
