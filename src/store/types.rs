//! Core data types for the segscope index store
//!
//! Documents go in through [`Field`]s; segments come back out as
//! [`FieldInfo`] metadata plus postings, doc values, stored fields, norms
//! and term vectors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::store::error::StoreError;

/// How much of the inverted index is recorded for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexOptions {
    None,
    Docs,
    DocsAndFreqs,
    DocsAndFreqsAndPositions,
    DocsAndFreqsAndPositionsAndOffsets,
}

impl IndexOptions {
    pub fn is_indexed(&self) -> bool {
        *self != IndexOptions::None
    }

    pub fn has_freqs(&self) -> bool {
        *self >= IndexOptions::DocsAndFreqs
    }

    pub fn has_positions(&self) -> bool {
        *self >= IndexOptions::DocsAndFreqsAndPositions
    }

    pub fn has_offsets(&self) -> bool {
        *self == IndexOptions::DocsAndFreqsAndPositionsAndOffsets
    }
}

impl fmt::Display for IndexOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexOptions::None => "NONE",
            IndexOptions::Docs => "DOCS",
            IndexOptions::DocsAndFreqs => "DOCS_AND_FREQS",
            IndexOptions::DocsAndFreqsAndPositions => "DOCS_AND_FREQS_AND_POSITIONS",
            IndexOptions::DocsAndFreqsAndPositionsAndOffsets => {
                "DOCS_AND_FREQS_AND_POSITIONS_AND_OFFSETS"
            }
        };
        write!(f, "{}", s)
    }
}

/// Columnar value kind recorded for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocValuesType {
    None,
    Numeric,
    Binary,
    Sorted,
    SortedNumeric,
    SortedSet,
}

impl fmt::Display for DocValuesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocValuesType::None => "NONE",
            DocValuesType::Numeric => "NUMERIC",
            DocValuesType::Binary => "BINARY",
            DocValuesType::Sorted => "SORTED",
            DocValuesType::SortedNumeric => "SORTED_NUMERIC",
            DocValuesType::SortedSet => "SORTED_SET",
        };
        write!(f, "{}", s)
    }
}

/// Physical encoding of segment and deletion files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    /// bincode + LZ4, the default
    Binary,
    /// Pretty-printed JSON, for diffing and debugging
    Text,
}

impl Codec {
    /// Name recorded in field attributes and reported by `info`
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Binary => "Lz4Binary",
            Codec::Text => "SimpleText",
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Codec::Binary
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Codec {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" | "lz4binary" => Ok(Codec::Binary),
            "text" | "simpletext" => Ok(Codec::Text),
            _ => Err(StoreError::UnknownCodec(s.to_string())),
        }
    }
}

/// Per-field metadata within a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub doc_values: DocValuesType,
    pub index_options: IndexOptions,
    pub has_norms: bool,
    pub has_payloads: bool,
    pub has_vectors: bool,
    pub stored: bool,
    pub attributes: BTreeMap<String, String>,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, number: u32) -> Self {
        Self {
            name: name.into(),
            number,
            doc_values: DocValuesType::None,
            index_options: IndexOptions::None,
            has_norms: false,
            has_payloads: false,
            has_vectors: false,
            stored: false,
            attributes: BTreeMap::new(),
        }
    }

    /// Fold another occurrence of the same field name into this info
    pub fn absorb(&mut self, options: &FieldOptions) {
        if options.index_options > self.index_options {
            self.index_options = options.index_options;
        }
        if self.doc_values == DocValuesType::None {
            self.doc_values = options.doc_values;
        }
        self.has_norms |= options.norms && options.index_options.is_indexed();
        self.has_vectors |= options.term_vectors;
        self.stored |= options.stored;
    }
}

/// A stored or indexed field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Long(i64),
    Double(f64),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Value as indexed term text, if it can be indexed
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Long(v) => write!(f, "{}", v),
            FieldValue::Double(v) => write!(f, "{}", v),
            FieldValue::Bytes(b) => write!(f, "{:?}", b),
        }
    }
}

/// How a single field occurrence is indexed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOptions {
    pub index_options: IndexOptions,
    pub tokenized: bool,
    pub stored: bool,
    pub norms: bool,
    pub term_vectors: bool,
    pub doc_values: DocValuesType,
}

impl FieldOptions {
    pub const NONE: FieldOptions = FieldOptions {
        index_options: IndexOptions::None,
        tokenized: false,
        stored: false,
        norms: false,
        term_vectors: false,
        doc_values: DocValuesType::None,
    };
}

/// One field occurrence in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub options: FieldOptions,
}

impl Field {
    /// Tokenized full-text field with positions, not stored
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            options: FieldOptions {
                index_options: IndexOptions::DocsAndFreqsAndPositions,
                tokenized: true,
                norms: true,
                ..FieldOptions::NONE
            },
        }
    }

    /// Untokenized, stored, docs-only keyword field
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            options: FieldOptions {
                index_options: IndexOptions::Docs,
                stored: true,
                ..FieldOptions::NONE
            },
        }
    }

    /// Tokenized field with term vectors (positions and offsets)
    pub fn text_with_vectors(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            options: FieldOptions {
                index_options: IndexOptions::DocsAndFreqsAndPositionsAndOffsets,
                tokenized: true,
                norms: true,
                term_vectors: true,
                ..FieldOptions::NONE
            },
        }
    }

    /// Stored-only value
    pub fn stored(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
            options: FieldOptions {
                stored: true,
                ..FieldOptions::NONE
            },
        }
    }

    pub fn numeric_doc_value(name: impl Into<String>, value: i64) -> Self {
        Self::doc_value(name, FieldValue::Long(value), DocValuesType::Numeric)
    }

    /// Double doc value, kept as its raw bits in a numeric column
    pub fn double_doc_value(name: impl Into<String>, value: f64) -> Self {
        Self::doc_value(name, FieldValue::Double(value), DocValuesType::Numeric)
    }

    pub fn sorted_numeric_doc_value(name: impl Into<String>, value: i64) -> Self {
        Self::doc_value(name, FieldValue::Long(value), DocValuesType::SortedNumeric)
    }

    pub fn sorted_doc_value(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::doc_value(name, FieldValue::Bytes(value.into()), DocValuesType::Sorted)
    }

    pub fn sorted_set_doc_value(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::doc_value(name, FieldValue::Bytes(value.into()), DocValuesType::SortedSet)
    }

    pub fn binary_doc_value(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::doc_value(name, FieldValue::Bytes(value.into()), DocValuesType::Binary)
    }

    fn doc_value(name: impl Into<String>, value: FieldValue, kind: DocValuesType) -> Self {
        Self {
            name: name.into(),
            value,
            options: FieldOptions {
                doc_values: kind,
                ..FieldOptions::NONE
            },
        }
    }
}

/// A document is an ordered list of field occurrences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One document entry in a term's postings list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: u32,
    pub freq: u32,
    pub positions: Vec<u32>,
    pub offsets: Vec<(u32, u32)>,
}

/// Doc value of a single document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocValue {
    Numeric(i64),
    Binary(Vec<u8>),
    Sorted(Vec<u8>),
    SortedNumeric(Vec<i64>),
    SortedSet(Vec<Vec<u8>>),
}

/// A stored field as read back from a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredField {
    pub name: String,
    pub value: FieldValue,
}

/// One term of a document's term vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermVectorEntry {
    pub term: String,
    pub freq: u32,
    pub positions: Vec<u32>,
    pub offsets: Vec<(u32, u32)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_options_levels() {
        assert!(!IndexOptions::None.is_indexed());
        assert!(!IndexOptions::Docs.has_freqs());
        assert!(IndexOptions::DocsAndFreqs.has_freqs());
        assert!(!IndexOptions::DocsAndFreqs.has_positions());
        assert!(IndexOptions::DocsAndFreqsAndPositionsAndOffsets.has_offsets());
        assert_eq!(
            IndexOptions::DocsAndFreqsAndPositions.to_string(),
            "DOCS_AND_FREQS_AND_POSITIONS"
        );
    }

    #[test]
    fn test_codec_parse() {
        assert_eq!("bin".parse::<Codec>().unwrap(), Codec::Binary);
        assert_eq!("TEXT".parse::<Codec>().unwrap(), Codec::Text);
        assert_eq!("SimpleText".parse::<Codec>().unwrap(), Codec::Text);
        assert!("zip".parse::<Codec>().is_err());
        assert_eq!(Codec::Binary.to_string(), "Lz4Binary");
    }

    #[test]
    fn test_field_info_absorb() {
        let mut info = FieldInfo::new("color", 0);
        info.absorb(&Field::sorted_doc_value("color", "red").options);
        info.absorb(&Field::string("color", "red").options);

        assert_eq!(info.doc_values, DocValuesType::Sorted);
        assert_eq!(info.index_options, IndexOptions::Docs);
        assert!(info.stored);
        assert!(!info.has_norms);
    }
}
