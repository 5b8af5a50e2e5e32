//! Segment files
//!
//! A segment is an immutable batch of documents. Everything about the
//! batch lives in one `_<n>.seg` file encoded with the segment's codec:
//!
//! ```text
//! SegmentData
//!   max_doc        documents in the segment, deleted ones included
//!   field_infos    per-field metadata, in first-seen order
//!   postings       field -> term -> [Posting]   (inverted index)
//!   doc_values     field -> [Option<DocValue>]  (one slot per doc)
//!   stored         doc -> [StoredField]
//!   norms          field -> [field length]      (one slot per doc)
//!   term_vectors   doc -> field -> [TermVectorEntry]
//! ```
//!
//! Deletions are kept apart from the segment in `_<n>_<delgen>.del`, so a
//! segment file is never rewritten once flushed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::handle::{Stat, TermStats};
use crate::store::analysis;
use crate::store::codec;
use crate::store::error::StoreResult;
use crate::store::types::{
    Codec, DocValue, DocValuesType, Document, Field, FieldInfo, FieldValue, Posting, StoredField,
    TermVectorEntry,
};

const POSTINGS_FORMAT_KEY: &str = "postings.format";
const DOCVALUES_FORMAT_KEY: &str = "docvalues.format";

/// Full in-memory content of one segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentData {
    pub max_doc: u32,
    pub field_infos: Vec<FieldInfo>,
    pub postings: BTreeMap<String, BTreeMap<String, Vec<Posting>>>,
    pub doc_values: BTreeMap<String, Vec<Option<DocValue>>>,
    pub stored: Vec<Vec<StoredField>>,
    pub norms: BTreeMap<String, Vec<u32>>,
    pub term_vectors: Vec<BTreeMap<String, Vec<TermVectorEntry>>>,
}

impl SegmentData {
    pub fn field_info(&self, name: &str) -> Option<&FieldInfo> {
        self.field_infos.iter().find(|fi| fi.name == name)
    }

    /// Term statistics for a field, `None` when it has no postings here
    pub fn term_stats(&self, field: &str) -> Option<TermStats> {
        let terms = self.postings.get(field)?;
        if terms.is_empty() {
            return None;
        }
        let has_freqs = self
            .field_info(field)
            .map(|fi| fi.index_options.has_freqs())
            .unwrap_or(false);

        let mut docs = BTreeSet::new();
        let mut sum_doc_freq = 0u64;
        let mut sum_total_term_freq = 0u64;
        for postings in terms.values() {
            sum_doc_freq += postings.len() as u64;
            for p in postings {
                docs.insert(p.doc);
                sum_total_term_freq += p.freq as u64;
            }
        }

        Some(TermStats {
            num_terms: Stat::Known(terms.len() as u64),
            doc_count: Stat::Known(docs.len() as u64),
            sum_doc_freq: Stat::Known(sum_doc_freq),
            sum_total_term_freq: if has_freqs {
                Stat::Known(sum_total_term_freq)
            } else {
                Stat::Unknown
            },
        })
    }

    /// Record `codec` as the postings/doc-values format of every field
    pub fn stamp_codec(&mut self, codec: Codec) {
        for fi in &mut self.field_infos {
            if fi.index_options.is_indexed() {
                fi.attributes
                    .insert(POSTINGS_FORMAT_KEY.to_string(), codec.name().to_string());
            }
            if fi.doc_values != DocValuesType::None {
                fi.attributes
                    .insert(DOCVALUES_FORMAT_KEY.to_string(), codec.name().to_string());
            }
        }
    }

    fn field_info_mut(&mut self, name: &str) -> &mut FieldInfo {
        let idx = match self.field_infos.iter().position(|fi| fi.name == name) {
            Some(idx) => idx,
            None => {
                let number = self.field_infos.len() as u32;
                self.field_infos.push(FieldInfo::new(name, number));
                self.field_infos.len() - 1
            }
        };
        &mut self.field_infos[idx]
    }

    fn pad_columns(&mut self) {
        let max_doc = self.max_doc as usize;
        for column in self.doc_values.values_mut() {
            column.resize(max_doc, None);
        }
        for norms in self.norms.values_mut() {
            norms.resize(max_doc, 0);
        }
    }
}

/// Deleted documents of one segment, by segment-local id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedDocs {
    docs: BTreeSet<u32>,
}

impl DeletedDocs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, doc: u32) -> bool {
        self.docs.contains(&doc)
    }

    /// Returns true when the doc was not already deleted
    pub fn insert(&mut self, doc: u32) -> bool {
        self.docs.insert(doc)
    }

    pub fn len(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.docs.iter().copied()
    }
}

/// Per-document inversion state for one field
#[derive(Default)]
struct InvertedField {
    length: u32,
    terms: BTreeMap<String, Posting>,
    vectors: bool,
}

/// Accumulates documents into a new segment
pub struct SegmentBuilder {
    data: SegmentData,
    codec: Codec,
}

impl SegmentBuilder {
    pub fn new(codec: Codec) -> Self {
        Self {
            data: SegmentData::default(),
            codec,
        }
    }

    pub fn doc_count(&self) -> u32 {
        self.data.max_doc
    }

    pub fn is_empty(&self) -> bool {
        self.data.max_doc == 0
    }

    /// Add a document, returning its segment-local id
    pub fn add(&mut self, doc: &Document) -> u32 {
        let doc_id = self.data.max_doc;
        self.data.max_doc += 1;

        let mut stored = Vec::new();
        let mut inverted: BTreeMap<String, InvertedField> = BTreeMap::new();

        for field in &doc.fields {
            self.data.field_info_mut(&field.name).absorb(&field.options);

            if field.options.stored {
                stored.push(StoredField {
                    name: field.name.clone(),
                    value: field.value.clone(),
                });
            }
            if field.options.doc_values != DocValuesType::None {
                self.add_doc_value(doc_id, field);
            }
            if field.options.index_options.is_indexed() {
                invert(&mut inverted, field);
            }
        }

        let mut vectors = BTreeMap::new();
        for (name, inv) in inverted {
            let has_norms = self
                .data
                .field_info(&name)
                .map(|fi| fi.has_norms)
                .unwrap_or(false);
            if has_norms {
                let norms = self.data.norms.entry(name.clone()).or_default();
                norms.resize(doc_id as usize, 0);
                norms.push(inv.length);
            }

            if inv.vectors {
                let entries = inv
                    .terms
                    .iter()
                    .map(|(term, p)| TermVectorEntry {
                        term: term.clone(),
                        freq: p.freq,
                        positions: p.positions.clone(),
                        offsets: p.offsets.clone(),
                    })
                    .collect();
                vectors.insert(name.clone(), entries);
            }

            let field_postings = self.data.postings.entry(name).or_default();
            for (term, mut posting) in inv.terms {
                posting.doc = doc_id;
                field_postings.entry(term).or_default().push(posting);
            }
        }

        self.data.stored.push(stored);
        self.data.term_vectors.push(vectors);
        doc_id
    }

    fn add_doc_value(&mut self, doc_id: u32, field: &Field) {
        let column = self.data.doc_values.entry(field.name.clone()).or_default();
        column.resize(doc_id as usize + 1, None);
        let slot = &mut column[doc_id as usize];

        let numeric = match &field.value {
            FieldValue::Long(v) => *v,
            FieldValue::Double(v) => v.to_bits() as i64,
            FieldValue::Text(s) => s.parse().unwrap_or(0),
            FieldValue::Bytes(_) => 0,
        };
        let bytes = match &field.value {
            FieldValue::Text(s) => s.as_bytes().to_vec(),
            FieldValue::Bytes(b) => b.clone(),
            other => other.to_string().into_bytes(),
        };

        *slot = match (field.options.doc_values, slot.take()) {
            (DocValuesType::Numeric, _) => Some(DocValue::Numeric(numeric)),
            (DocValuesType::Binary, _) => Some(DocValue::Binary(bytes)),
            (DocValuesType::Sorted, _) => Some(DocValue::Sorted(bytes)),
            (DocValuesType::SortedNumeric, Some(DocValue::SortedNumeric(mut values))) => {
                values.push(numeric);
                values.sort_unstable();
                Some(DocValue::SortedNumeric(values))
            }
            (DocValuesType::SortedNumeric, _) => Some(DocValue::SortedNumeric(vec![numeric])),
            (DocValuesType::SortedSet, Some(DocValue::SortedSet(mut values))) => {
                if let Err(idx) = values.binary_search(&bytes) {
                    values.insert(idx, bytes);
                }
                Some(DocValue::SortedSet(values))
            }
            (DocValuesType::SortedSet, _) => Some(DocValue::SortedSet(vec![bytes])),
            (DocValuesType::None, previous) => previous,
        };
    }

    /// Finish the segment
    pub fn build(mut self) -> SegmentData {
        self.data.pad_columns();
        self.data.stamp_codec(self.codec);
        self.data
    }
}

/// Invert one field occurrence into the document's per-field term map
fn invert(inverted: &mut BTreeMap<String, InvertedField>, field: &Field) {
    let Some(text) = field.value.as_text() else {
        return;
    };
    let options = field.options.index_options;
    let entry = inverted.entry(field.name.clone()).or_default();
    entry.vectors |= field.options.term_vectors;

    let tokens = if field.options.tokenized {
        analysis::tokenize(text)
    } else {
        vec![analysis::Token {
            text: text.to_string(),
            position: 0,
            start: 0,
            end: text.len() as u32,
        }]
    };

    let base = entry.length;
    for token in &tokens {
        let posting = entry
            .terms
            .entry(token.text.clone())
            .or_insert_with(|| Posting {
                doc: 0,
                freq: 0,
                positions: Vec::new(),
                offsets: Vec::new(),
            });
        posting.freq = if options.has_freqs() { posting.freq + 1 } else { 1 };
        if options.has_positions() {
            posting.positions.push(base + token.position);
        }
        if options.has_offsets() {
            posting.offsets.push((token.start, token.end));
        }
    }
    entry.length += tokens.len() as u32;
}

/// Merge live documents of several segments into one, renumbering docs
pub fn merge_segments(sources: &[(&SegmentData, &DeletedDocs)], codec: Codec) -> SegmentData {
    let mut out = SegmentData::default();

    for (segment, deleted) in sources {
        let doc_map: Vec<Option<u32>> = (0..segment.max_doc)
            .map(|doc| {
                if deleted.contains(doc) {
                    None
                } else {
                    out.max_doc += 1;
                    Some(out.max_doc - 1)
                }
            })
            .collect();

        for fi in &segment.field_infos {
            if out.field_info(&fi.name).is_none() {
                let mut copy = fi.clone();
                copy.number = out.field_infos.len() as u32;
                out.field_infos.push(copy);
            }
        }

        for (field, terms) in &segment.postings {
            let out_terms = out.postings.entry(field.clone()).or_default();
            for (term, postings) in terms {
                let remapped: Vec<Posting> = postings
                    .iter()
                    .filter_map(|p| {
                        doc_map
                            .get(p.doc as usize)
                            .copied()
                            .flatten()
                            .map(|doc| Posting { doc, ..p.clone() })
                    })
                    .collect();
                if !remapped.is_empty() {
                    out_terms.entry(term.clone()).or_default().extend(remapped);
                }
            }
        }

        for (old, new) in doc_map.iter().enumerate() {
            let Some(new) = *new else { continue };
            let new = new as usize;

            for (field, column) in &segment.doc_values {
                if let Some(Some(value)) = column.get(old) {
                    let out_column = out.doc_values.entry(field.clone()).or_default();
                    out_column.resize(new + 1, None);
                    out_column[new] = Some(value.clone());
                }
            }
            for (field, norms) in &segment.norms {
                if let Some(&norm) = norms.get(old) {
                    let out_norms = out.norms.entry(field.clone()).or_default();
                    out_norms.resize(new + 1, 0);
                    out_norms[new] = norm;
                }
            }
            out.stored
                .push(segment.stored.get(old).cloned().unwrap_or_default());
            out.term_vectors
                .push(segment.term_vectors.get(old).cloned().unwrap_or_default());
        }
    }

    out.postings.retain(|_, terms| !terms.is_empty());
    out.pad_columns();
    out.stamp_codec(codec);
    out
}

pub fn segment_file_name(name: &str) -> String {
    format!("{}.seg", name)
}

pub fn deletes_file_name(name: &str, del_gen: u64) -> String {
    format!("{}_{}.del", name, del_gen)
}

/// Write a segment file, returning its size in bytes
pub fn write_segment(dir: &Path, name: &str, data: &SegmentData, codec: Codec) -> StoreResult<u64> {
    write_file(&dir.join(segment_file_name(name)), &codec::encode(data, codec)?)
}

/// Read a segment file and report the codec it was written with
pub fn read_segment(dir: &Path, name: &str) -> StoreResult<(SegmentData, Codec)> {
    let bytes = fs::read(dir.join(segment_file_name(name)))?;
    codec::decode(&bytes)
}

pub fn write_deletes(
    dir: &Path,
    name: &str,
    del_gen: u64,
    deleted: &DeletedDocs,
    codec: Codec,
) -> StoreResult<u64> {
    write_file(
        &dir.join(deletes_file_name(name, del_gen)),
        &codec::encode(deleted, codec)?,
    )
}

pub fn read_deletes(dir: &Path, name: &str, del_gen: u64) -> StoreResult<DeletedDocs> {
    let bytes = fs::read(dir.join(deletes_file_name(name, del_gen)))?;
    let (deleted, _) = codec::decode(&bytes)?;
    Ok(deleted)
}

fn write_file(path: &Path, bytes: &[u8]) -> StoreResult<u64> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(bytes.len() as u64)
}
