//! Index operations behind the shell commands
//!
//! Each operation works through a [`Session`](crate::session::Session) and
//! returns a plain result value; the commands in [`crate::commands`] only
//! parse arguments and format output.
//!
//! - [`field_stats`]: per-field statistics rolled up over segments
//! - [`trim`]: random deletion of a share of the live documents
//! - [`export`]: copy into a fresh single-segment index

pub mod export;
pub mod field_stats;
pub mod trim;

pub use export::{export, ExportMode, ExportSummary};
pub use field_stats::{
    aggregate_fields, summarize_index, summarize_segment, FieldStatsAggregate, IndexSummary,
    SegmentSummary,
};
pub use trim::{sampling_predicate, trim, TrimOutcome, TrimPercent};
