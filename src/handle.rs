//! Index handle capabilities
//!
//! The session and its operations never touch segment files directly.
//! They work against these traits, which any segmented index engine can
//! implement:
//!
//! ```text
//! IndexHandleFactory ──open_reader──▶ IndexReader ──leaves──▶ LeafReader (one per segment)
//!         │
//!         └────────────open_writer──▶ IndexWriter (exclusive per directory)
//! ```
//!
//! The on-disk engine in [`crate::store`] is the production implementation;
//! [`testing`] holds an in-memory fake used by unit tests.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;
use std::path::Path;
use std::sync::Arc;

use crate::store::error::StoreResult;
use crate::store::types::{
    Codec, DocValue, Document, FieldInfo, Posting, StoredField, TermVectorEntry,
};

/// A statistic that an engine may decline to report
///
/// `Unknown` absorbs everything it is added to, so a partially known sum
/// can never pass for a real count. It renders as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Known(u64),
    Unknown,
}

impl Stat {
    /// Map an engine's raw value, where negatives mean "unknown"
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            Stat::Unknown
        } else {
            Stat::Known(raw as u64)
        }
    }

    pub fn as_raw(&self) -> i64 {
        match self {
            Stat::Known(v) => i64::try_from(*v).unwrap_or(i64::MAX),
            Stat::Unknown => -1,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Stat::Known(_))
    }
}

impl Default for Stat {
    fn default() -> Self {
        Stat::Known(0)
    }
}

impl Add for Stat {
    type Output = Stat;

    fn add(self, rhs: Stat) -> Stat {
        match (self, rhs) {
            (Stat::Known(a), Stat::Known(b)) => Stat::Known(a.saturating_add(b)),
            _ => Stat::Unknown,
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

/// Postings statistics of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TermStats {
    pub num_terms: Stat,
    pub doc_count: Stat,
    pub sum_doc_freq: Stat,
    pub sum_total_term_freq: Stat,
}

impl TermStats {
    pub const ZERO: TermStats = TermStats {
        num_terms: Stat::Known(0),
        doc_count: Stat::Known(0),
        sum_doc_freq: Stat::Known(0),
        sum_total_term_freq: Stat::Known(0),
    };

    /// Build from raw engine values, negatives meaning "unknown"
    pub fn from_raw(num_terms: i64, doc_count: i64, sum_doc_freq: i64, sum_ttf: i64) -> Self {
        Self {
            num_terms: Stat::from_raw(num_terms),
            doc_count: Stat::from_raw(doc_count),
            sum_doc_freq: Stat::from_raw(sum_doc_freq),
            sum_total_term_freq: Stat::from_raw(sum_ttf),
        }
    }

    /// Component-wise sum
    pub fn accumulate(&mut self, other: &TermStats) {
        self.num_terms = self.num_terms + other.num_terms;
        self.doc_count = self.doc_count + other.doc_count;
        self.sum_doc_freq = self.sum_doc_freq + other.sum_doc_freq;
        self.sum_total_term_freq = self.sum_total_term_freq + other.sum_total_term_freq;
    }
}

/// Read access to one segment. Doc ids are segment-local.
pub trait LeafReader: Send + Sync {
    /// Position of the segment within its reader
    fn ord(&self) -> usize;
    fn name(&self) -> &str;
    fn codec_name(&self) -> &str;
    /// Global id of the segment's first document
    fn doc_base(&self) -> u32;
    fn max_doc(&self) -> u32;
    fn num_docs(&self) -> u32;

    fn num_deleted_docs(&self) -> u32 {
        self.max_doc() - self.num_docs()
    }

    fn field_infos(&self) -> &[FieldInfo];

    /// Term statistics, `None` when the field has no postings in this segment
    fn terms(&self, field: &str) -> Option<TermStats>;

    fn is_live(&self, doc: u32) -> bool;

    /// Terms of a field with their document frequency, in term order
    fn term_doc_freqs(&self, _field: &str) -> Vec<(String, u32)> {
        Vec::new()
    }

    fn postings(&self, _field: &str, _term: &str) -> Option<Vec<Posting>> {
        None
    }

    fn doc_value(&self, _field: &str, _doc: u32) -> Option<DocValue> {
        None
    }

    fn stored_fields(&self, _doc: u32) -> Option<Vec<StoredField>> {
        None
    }

    fn term_vector(&self, _field: &str, _doc: u32) -> Option<Vec<TermVectorEntry>> {
        None
    }

    fn norm(&self, _field: &str, _doc: u32) -> Option<u32> {
        None
    }
}

/// Point-in-time view over every segment of an index
pub trait IndexReader: Send + Sync {
    /// Commit generation this reader was opened on
    fn generation(&self) -> u64;

    fn leaves(&self) -> Vec<&dyn LeafReader>;

    fn num_docs(&self) -> u32 {
        self.leaves().iter().map(|l| l.num_docs()).sum()
    }

    fn max_doc(&self) -> u32 {
        self.leaves().iter().map(|l| l.max_doc()).sum()
    }

    fn num_deleted_docs(&self) -> u32 {
        self.max_doc() - self.num_docs()
    }

    /// Segment holding a global doc id, with the segment-local id
    fn leaf_for_doc(&self, doc: u32) -> Option<(&dyn LeafReader, u32)> {
        self.leaves()
            .into_iter()
            .find(|l| doc >= l.doc_base() && doc - l.doc_base() < l.max_doc())
            .map(|l| (l, doc - l.doc_base()))
    }
}

/// Mutation handle. At most one may be open per index directory.
pub trait IndexWriter: Send {
    fn add_document(&mut self, doc: Document) -> StoreResult<()>;

    /// Turn buffered documents into a segment
    fn flush(&mut self) -> StoreResult<()>;

    /// Delete every live document the predicate matches
    ///
    /// The predicate sees global doc ids and is called once per live
    /// document. Returns the number of documents deleted.
    fn delete_by_predicate(&mut self, predicate: &mut dyn FnMut(u32) -> bool)
        -> StoreResult<u64>;

    fn delete_by_term(&mut self, field: &str, term: &str) -> StoreResult<u64>;

    /// Copy all segments of another index's latest commit into this one
    fn add_indexes(&mut self, source: &Path) -> StoreResult<()>;

    fn force_merge(&mut self, max_segments: usize) -> StoreResult<()>;

    fn commit_data(&self) -> BTreeMap<String, String>;

    fn set_commit_data(&mut self, data: BTreeMap<String, String>);

    /// Make all changes durable, returning the new commit generation
    fn commit(&mut self) -> StoreResult<u64>;

    fn num_docs(&self) -> u32;

    fn max_doc(&self) -> u32;

    fn segment_count(&self) -> usize;

    /// Commit pending changes and release the directory lock
    fn close(self: Box<Self>) -> StoreResult<()>;
}

/// Metadata of the newest commit, read straight from the directory
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    pub generation: u64,
    /// Codec of the first segment, `None` for an empty index
    pub codec: Option<String>,
    pub user_data: BTreeMap<String, String>,
    pub segment_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Opens readers and writers over one index location
pub trait IndexHandleFactory: Send + Sync {
    fn location(&self) -> &Path;

    /// Human-readable identity of the directory implementation
    fn describe(&self) -> String;

    fn open_reader(&self) -> StoreResult<Arc<dyn IndexReader>>;

    /// Reopen if a newer commit exists, else hand back `current`
    fn refresh(&self, current: &Arc<dyn IndexReader>) -> StoreResult<Arc<dyn IndexReader>>;

    /// Fails with `LockHeld` while another writer is open
    fn open_writer(&self) -> StoreResult<Box<dyn IndexWriter>>;

    fn latest_commit(&self) -> StoreResult<CommitInfo>;

    /// Writer over a brand-new index at `target`, replacing anything there
    fn create_index(&self, target: &Path, codec: Codec) -> StoreResult<Box<dyn IndexWriter>>;
}
