//! Raw source mappings.
//!
//! A raw mapping positions generated output against original source before
//! the compositor shifts it into bundle coordinates. Serialized form is the
//! tuple convention used by source-map tooling: 2 fields for a generated
//! position with no source, 4 with a source position, 5 with a name.

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One mapping tuple. Lines are 1-based, columns 0-based, both relative to
/// the module's own wrapped code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source_line: Option<u32>,
    pub source_column: Option<u32>,
    pub name: Option<String>,
}

impl RawMapping {
    /// A 2-tuple: generated position with no source attribution. Used as the
    /// terminating mapping so out-of-bounds lookups return null instead of
    /// aliasing the previous mapping.
    pub fn generated(line: u32, column: u32) -> Self {
        Self {
            generated_line: line,
            generated_column: column,
            source_line: None,
            source_column: None,
            name: None,
        }
    }

    /// A 4-tuple: generated position mapped to a source position.
    pub fn source(line: u32, column: u32, source_line: u32, source_column: u32) -> Self {
        Self {
            generated_line: line,
            generated_column: column,
            source_line: Some(source_line),
            source_column: Some(source_column),
            name: None,
        }
    }

    /// A 5-tuple carrying an original name.
    pub fn named(
        line: u32,
        column: u32,
        source_line: u32,
        source_column: u32,
        name: impl Into<String>,
    ) -> Self {
        Self {
            generated_line: line,
            generated_column: column,
            source_line: Some(source_line),
            source_column: Some(source_column),
            name: Some(name.into()),
        }
    }

    pub fn has_source(&self) -> bool {
        self.source_line.is_some()
    }
}

impl Serialize for RawMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = match (self.source_line.is_some(), self.name.is_some()) {
            (true, true) => 5,
            (true, false) => 4,
            _ => 2,
        };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.generated_line)?;
        seq.serialize_element(&self.generated_column)?;
        if let (Some(sl), Some(sc)) = (self.source_line, self.source_column) {
            seq.serialize_element(&sl)?;
            seq.serialize_element(&sc)?;
            if let Some(name) = &self.name {
                seq.serialize_element(name)?;
            }
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for RawMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TupleVisitor;

        impl<'de> Visitor<'de> for TupleVisitor {
            type Value = RawMapping;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a mapping tuple of 2, 4, or 5 elements")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawMapping, A::Error> {
                let generated_line: u32 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let generated_column: u32 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let source_line: Option<u32> = seq.next_element()?;
                let source_column: Option<u32> = match source_line {
                    Some(_) => Some(
                        seq.next_element()?
                            .ok_or_else(|| de::Error::invalid_length(3, &self))?,
                    ),
                    None => None,
                };
                let name: Option<String> = if source_line.is_some() {
                    seq.next_element()?
                } else {
                    None
                };
                Ok(RawMapping {
                    generated_line,
                    generated_column,
                    source_line,
                    source_column,
                    name,
                })
            }
        }

        deserializer.deserialize_seq(TupleVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_arity_round_trip() {
        let mappings = vec![
            RawMapping::source(2, 0, 1, 0),
            RawMapping::named(3, 4, 2, 8, "handler"),
            RawMapping::generated(5, 12),
        ];
        let json = serde_json::to_string(&mappings).unwrap();
        assert_eq!(json, r#"[[2,0,1,0],[3,4,2,8,"handler"],[5,12]]"#);

        let back: Vec<RawMapping> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mappings);
    }

    #[test]
    fn test_ordering_fields() {
        let m = RawMapping::source(4, 7, 3, 1);
        assert_eq!((m.generated_line, m.generated_column), (4, 7));
        assert!(m.has_source());
        assert!(!RawMapping::generated(1, 0).has_source());
    }
}
