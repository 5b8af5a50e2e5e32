//! Point-in-time readers over a committed index
//!
//! Opening a reader decodes every segment of the latest commit into memory,
//! so no file handle outlives [`DirectoryReader::open`].

use std::path::Path;

use crate::handle::{IndexReader, LeafReader, TermStats};
use crate::store::commit::{SegmentCommitInfo, SegmentInfos};
use crate::store::error::{StoreError, StoreResult};
use crate::store::segment::{read_deletes, read_segment, DeletedDocs, SegmentData};
use crate::store::types::{DocValue, FieldInfo, Posting, StoredField, TermVectorEntry};

/// One decoded segment
pub struct SegmentReader {
    ord: usize,
    doc_base: u32,
    info: SegmentCommitInfo,
    data: SegmentData,
    deleted: DeletedDocs,
}

impl SegmentReader {
    pub fn open(dir: &Path, info: &SegmentCommitInfo, ord: usize, doc_base: u32) -> StoreResult<Self> {
        let (data, _) = read_segment(dir, &info.name)?;
        if data.max_doc != info.max_doc {
            return Err(StoreError::Corruption(format!(
                "Segment {} holds {} docs, commit says {}",
                info.name, data.max_doc, info.max_doc
            )));
        }
        let deleted = if info.del_gen > 0 {
            read_deletes(dir, &info.name, info.del_gen)?
        } else {
            DeletedDocs::new()
        };

        Ok(Self {
            ord,
            doc_base,
            info: info.clone(),
            data,
            deleted,
        })
    }

    pub fn data(&self) -> &SegmentData {
        &self.data
    }

    pub fn deleted(&self) -> &DeletedDocs {
        &self.deleted
    }
}

impl LeafReader for SegmentReader {
    fn ord(&self) -> usize {
        self.ord
    }

    fn name(&self) -> &str {
        &self.info.name
    }

    fn codec_name(&self) -> &str {
        self.info.codec.name()
    }

    fn doc_base(&self) -> u32 {
        self.doc_base
    }

    fn max_doc(&self) -> u32 {
        self.data.max_doc
    }

    fn num_docs(&self) -> u32 {
        self.data.max_doc - self.deleted.len()
    }

    fn field_infos(&self) -> &[FieldInfo] {
        &self.data.field_infos
    }

    fn terms(&self, field: &str) -> Option<TermStats> {
        self.data.term_stats(field)
    }

    fn is_live(&self, doc: u32) -> bool {
        doc < self.data.max_doc && !self.deleted.contains(doc)
    }

    fn term_doc_freqs(&self, field: &str) -> Vec<(String, u32)> {
        self.data
            .postings
            .get(field)
            .map(|terms| {
                terms
                    .iter()
                    .map(|(term, postings)| (term.clone(), postings.len() as u32))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn postings(&self, field: &str, term: &str) -> Option<Vec<Posting>> {
        self.data.postings.get(field)?.get(term).cloned()
    }

    fn doc_value(&self, field: &str, doc: u32) -> Option<DocValue> {
        self.data.doc_values.get(field)?.get(doc as usize)?.clone()
    }

    fn stored_fields(&self, doc: u32) -> Option<Vec<StoredField>> {
        self.data.stored.get(doc as usize).cloned()
    }

    fn term_vector(&self, field: &str, doc: u32) -> Option<Vec<TermVectorEntry>> {
        self.data.term_vectors.get(doc as usize)?.get(field).cloned()
    }

    fn norm(&self, field: &str, doc: u32) -> Option<u32> {
        self.data.norms.get(field)?.get(doc as usize).copied()
    }
}

/// All segments of one commit
pub struct DirectoryReader {
    generation: u64,
    segments: Vec<SegmentReader>,
}

impl DirectoryReader {
    /// Open the latest commit in `dir`
    pub fn open(dir: &Path) -> StoreResult<Self> {
        let infos = SegmentInfos::read_latest(dir)?;
        Self::open_commit(dir, &infos)
    }

    pub fn open_commit(dir: &Path, infos: &SegmentInfos) -> StoreResult<Self> {
        let mut doc_base = 0;
        let mut segments = Vec::with_capacity(infos.segments.len());
        for (ord, info) in infos.segments.iter().enumerate() {
            let segment = SegmentReader::open(dir, info, ord, doc_base)?;
            doc_base += segment.max_doc();
            segments.push(segment);
        }

        tracing::debug!(
            dir = %dir.display(),
            generation = infos.generation,
            segments = segments.len(),
            "Opened reader"
        );

        Ok(Self {
            generation: infos.generation,
            segments,
        })
    }

    pub fn segments(&self) -> &[SegmentReader] {
        &self.segments
    }
}

impl IndexReader for DirectoryReader {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn leaves(&self) -> Vec<&dyn LeafReader> {
        self.segments.iter().map(|s| s as &dyn LeafReader).collect()
    }
}
