//! Field statistics roll-up across segments
//!
//! For every field name, the first segment that defines it supplies the
//! [`FieldInfo`]; the four term statistics are summed over every segment
//! that has postings for the field. A statistic any segment reports as
//! unknown stays unknown in the total.

use crate::handle::{CommitInfo, IndexReader, LeafReader, TermStats};
use crate::session::{SessionError, SessionResult};
use crate::store::types::FieldInfo;

/// One field's metadata and summed term statistics
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStatsAggregate {
    pub info: FieldInfo,
    pub stats: TermStats,
}

/// Whole-index summary reported by `info`
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub num_docs: u32,
    pub max_doc: u32,
    pub num_deleted_docs: u32,
    pub segment_count: usize,
    /// Codec of the latest commit's first segment
    pub codec: Option<String>,
    pub fields: Vec<FieldStatsAggregate>,
}

/// Summary of one segment reported by `info <segment>`
#[derive(Debug, Clone)]
pub struct SegmentSummary {
    pub ord: usize,
    pub name: String,
    pub codec: String,
    pub doc_base: u32,
    pub num_docs: u32,
    pub max_doc: u32,
    pub num_deleted_docs: u32,
    pub fields: Vec<FieldStatsAggregate>,
}

/// Aggregate field statistics over `leaves`, in first-seen field order
pub fn aggregate_fields(leaves: &[&dyn LeafReader]) -> Vec<FieldStatsAggregate> {
    let mut fields: Vec<FieldStatsAggregate> = Vec::new();

    for leaf in leaves {
        for info in leaf.field_infos() {
            let idx = match fields.iter().position(|f| f.info.name == info.name) {
                Some(idx) => idx,
                None => {
                    fields.push(FieldStatsAggregate {
                        info: info.clone(),
                        stats: TermStats::ZERO,
                    });
                    fields.len() - 1
                }
            };
            if let Some(stats) = leaf.terms(&info.name) {
                fields[idx].stats.accumulate(&stats);
            }
        }
    }

    fields
}

pub fn summarize_index(reader: &dyn IndexReader, commit: &CommitInfo) -> IndexSummary {
    let leaves = reader.leaves();
    IndexSummary {
        num_docs: reader.num_docs(),
        max_doc: reader.max_doc(),
        num_deleted_docs: reader.num_deleted_docs(),
        segment_count: leaves.len(),
        codec: commit.codec.clone(),
        fields: aggregate_fields(&leaves),
    }
}

/// Summarize segment `ord`, failing with `InvalidSegment` when out of range
pub fn summarize_segment(reader: &dyn IndexReader, ord: usize) -> SessionResult<SegmentSummary> {
    let leaves = reader.leaves();
    let leaf = *leaves
        .get(ord)
        .ok_or_else(|| SessionError::invalid_segment(ord.to_string(), leaves.len()))?;

    Ok(SegmentSummary {
        ord,
        name: leaf.name().to_string(),
        codec: leaf.codec_name().to_string(),
        doc_base: leaf.doc_base(),
        num_docs: leaf.num_docs(),
        max_doc: leaf.max_doc(),
        num_deleted_docs: leaf.num_deleted_docs(),
        fields: aggregate_fields(&[leaf]),
    })
}
