//! Index writer
//!
//! Buffers added documents and flushes them into new segments, records
//! deletions against existing segments, merges, and publishes all of it as
//! a new commit. Only one writer can be open per directory; it holds
//! `write.lock` until it is closed or dropped.
//!
//! Dropping a writer without `commit`/`close` discards everything since
//! the last commit. Orphaned segment files are removed by the next commit.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::handle::IndexWriter;
use crate::store::commit::{self, SegmentCommitInfo, SegmentInfos};
use crate::store::error::{StoreError, StoreResult};
use crate::store::lock::WriteLock;
use crate::store::segment::{
    deletes_file_name, merge_segments, read_deletes, read_segment, segment_file_name,
    write_deletes, write_segment, DeletedDocs, SegmentBuilder, SegmentData,
};
use crate::store::types::{Codec, Document};

/// What to do with an existing index when a writer opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Start from an empty index, discarding any existing one
    Create,
    /// Require an existing index
    Append,
    CreateOrAppend,
}

#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Codec for segments this writer flushes or merges
    pub codec: Codec,
    /// Buffered documents that trigger a flush
    pub max_buffered_docs: usize,
    pub open_mode: OpenMode,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            codec: Codec::Binary,
            max_buffered_docs: 10_000,
            open_mode: OpenMode::CreateOrAppend,
        }
    }
}

/// A segment as tracked by the writer
struct WriterSegment {
    info: SegmentCommitInfo,
    /// Decoded lazily, only when postings or content are needed
    data: Option<SegmentData>,
    deleted: DeletedDocs,
    /// Deletions changed since the last commit
    pending_deletes: bool,
}

impl WriterSegment {
    fn load(&mut self, dir: &Path) -> StoreResult<&SegmentData> {
        if self.data.is_none() {
            let (data, _) = read_segment(dir, &self.info.name)?;
            self.data = Some(data);
        }
        self.data
            .as_ref()
            .ok_or_else(|| StoreError::InvalidSegment(self.info.name.clone()))
    }

    fn num_docs(&self) -> u32 {
        self.info.max_doc - self.deleted.len()
    }
}

pub struct FsIndexWriter {
    dir: PathBuf,
    config: WriterConfig,
    _lock: WriteLock,
    infos: SegmentInfos,
    segments: Vec<WriterSegment>,
    buffer: SegmentBuilder,
    user_data: BTreeMap<String, String>,
    dirty: bool,
}

impl FsIndexWriter {
    /// Open a writer on `dir`, taking the directory lock
    pub fn open(dir: &Path, config: WriterConfig) -> StoreResult<Self> {
        if config.open_mode != OpenMode::Append {
            fs::create_dir_all(dir)?;
        }
        if !dir.is_dir() {
            return Err(StoreError::IndexNotFound(dir.to_path_buf()));
        }

        let lock = WriteLock::acquire(dir)?;

        let (infos, dirty) = match config.open_mode {
            OpenMode::Create => {
                let removed = commit::delete_all(dir)?;
                if removed > 0 {
                    tracing::info!(dir = %dir.display(), removed, "Discarded existing index");
                }
                (SegmentInfos::empty(), true)
            }
            OpenMode::Append => (SegmentInfos::read_latest(dir)?, false),
            OpenMode::CreateOrAppend => match SegmentInfos::read_latest(dir) {
                Ok(infos) => (infos, false),
                Err(StoreError::IndexNotFound(_)) => (SegmentInfos::empty(), true),
                Err(e) => return Err(e),
            },
        };

        let mut segments = Vec::with_capacity(infos.segments.len());
        for info in &infos.segments {
            let deleted = if info.del_gen > 0 {
                read_deletes(dir, &info.name, info.del_gen)?
            } else {
                DeletedDocs::new()
            };
            segments.push(WriterSegment {
                info: info.clone(),
                data: None,
                deleted,
                pending_deletes: false,
            });
        }

        tracing::info!(
            dir = %dir.display(),
            generation = infos.generation,
            codec = %config.codec,
            "Opened index writer"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            user_data: infos.user_data.clone(),
            buffer: SegmentBuilder::new(config.codec),
            config,
            _lock: lock,
            infos,
            segments,
            dirty,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn codec(&self) -> Codec {
        self.config.codec
    }

    fn flush_buffer(&mut self) -> StoreResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let builder = std::mem::replace(&mut self.buffer, SegmentBuilder::new(self.config.codec));
        let data = builder.build();
        let name = self.infos.next_segment_name();
        let bytes = write_segment(&self.dir, &name, &data, self.config.codec)?;

        tracing::debug!(segment = %name, docs = data.max_doc, bytes, "Flushed segment");

        self.segments.push(WriterSegment {
            info: SegmentCommitInfo {
                name,
                codec: self.config.codec,
                max_doc: data.max_doc,
                del_count: 0,
                del_gen: 0,
            },
            data: Some(data),
            deleted: DeletedDocs::new(),
            pending_deletes: false,
        });
        self.dirty = true;
        Ok(())
    }

    /// Replace `segments[range]` with one merged segment
    fn merge_range(&mut self, start: usize, end: usize) -> StoreResult<()> {
        for seg in &mut self.segments[start..end] {
            seg.load(&self.dir)?;
        }

        let merged = {
            let mut sources = Vec::with_capacity(end - start);
            for seg in &self.segments[start..end] {
                let data = seg
                    .data
                    .as_ref()
                    .ok_or_else(|| StoreError::InvalidSegment(seg.info.name.clone()))?;
                sources.push((data, &seg.deleted));
            }
            merge_segments(&sources, self.config.codec)
        };

        let merged_names: Vec<String> = self.segments[start..end]
            .iter()
            .map(|s| s.info.name.clone())
            .collect();

        if merged.max_doc == 0 {
            self.segments.drain(start..end);
            tracing::debug!(segments = ?merged_names, "Dropped fully deleted segments");
            return Ok(());
        }

        let name = self.infos.next_segment_name();
        write_segment(&self.dir, &name, &merged, self.config.codec)?;
        tracing::debug!(
            segments = ?merged_names,
            into = %name,
            docs = merged.max_doc,
            "Merged segments"
        );

        let segment = WriterSegment {
            info: SegmentCommitInfo {
                name,
                codec: self.config.codec,
                max_doc: merged.max_doc,
                del_count: 0,
                del_gen: 0,
            },
            data: Some(merged),
            deleted: DeletedDocs::new(),
            pending_deletes: false,
        };
        self.segments.splice(start..end, std::iter::once(segment));
        Ok(())
    }
}

impl IndexWriter for FsIndexWriter {
    fn add_document(&mut self, doc: Document) -> StoreResult<()> {
        self.buffer.add(&doc);
        if self.buffer.doc_count() as usize >= self.config.max_buffered_docs.max(1) {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.flush_buffer()
    }

    fn delete_by_predicate(
        &mut self,
        predicate: &mut dyn FnMut(u32) -> bool,
    ) -> StoreResult<u64> {
        self.flush_buffer()?;

        let mut deleted = 0u64;
        let mut base = 0u32;
        for seg in &mut self.segments {
            for doc in 0..seg.info.max_doc {
                if !seg.deleted.contains(doc) && predicate(base + doc) {
                    seg.deleted.insert(doc);
                    seg.pending_deletes = true;
                    deleted += 1;
                }
            }
            base += seg.info.max_doc;
        }

        if deleted > 0 {
            self.dirty = true;
        }
        tracing::debug!(deleted, "Deleted documents by predicate");
        Ok(deleted)
    }

    fn delete_by_term(&mut self, field: &str, term: &str) -> StoreResult<u64> {
        self.flush_buffer()?;

        let mut deleted = 0u64;
        for seg in &mut self.segments {
            let docs: Vec<u32> = seg
                .load(&self.dir)?
                .postings
                .get(field)
                .and_then(|terms| terms.get(term))
                .map(|postings| postings.iter().map(|p| p.doc).collect())
                .unwrap_or_default();
            for doc in docs {
                if seg.deleted.insert(doc) {
                    seg.pending_deletes = true;
                    deleted += 1;
                }
            }
        }

        if deleted > 0 {
            self.dirty = true;
        }
        tracing::debug!(field, term, deleted, "Deleted documents by term");
        Ok(deleted)
    }

    fn add_indexes(&mut self, source: &Path) -> StoreResult<()> {
        if same_location(source, &self.dir) {
            return Err(StoreError::InvalidArgument(format!(
                "cannot add index {} to itself",
                source.display()
            )));
        }
        self.flush_buffer()?;

        let source_infos = SegmentInfos::read_latest(source)?;
        for info in &source_infos.segments {
            let name = self.infos.next_segment_name();
            fs::copy(
                source.join(segment_file_name(&info.name)),
                self.dir.join(segment_file_name(&name)),
            )?;

            let (deleted, del_gen) = if info.del_gen > 0 {
                fs::copy(
                    source.join(deletes_file_name(&info.name, info.del_gen)),
                    self.dir.join(deletes_file_name(&name, 1)),
                )?;
                (read_deletes(&self.dir, &name, 1)?, 1)
            } else {
                (DeletedDocs::new(), 0)
            };

            tracing::debug!(from = %info.name, to = %name, codec = %info.codec, "Copied segment");

            self.segments.push(WriterSegment {
                info: SegmentCommitInfo {
                    name,
                    codec: info.codec,
                    max_doc: info.max_doc,
                    del_count: deleted.len(),
                    del_gen,
                },
                data: None,
                deleted,
                pending_deletes: false,
            });
        }

        self.dirty = true;
        tracing::info!(
            source = %source.display(),
            segments = source_infos.segments.len(),
            "Added indexes"
        );
        Ok(())
    }

    fn force_merge(&mut self, max_segments: usize) -> StoreResult<()> {
        self.flush_buffer()?;
        let max_segments = max_segments.max(1);

        let has_deletions = self.segments.iter().any(|s| !s.deleted.is_empty());
        if self.segments.len() <= max_segments && !has_deletions {
            tracing::debug!(
                segments = self.segments.len(),
                max_segments,
                "Nothing to merge"
            );
            return Ok(());
        }

        if self.segments.len() > max_segments {
            let start = max_segments - 1;
            let end = self.segments.len();
            self.merge_range(start, end)?;
        }

        // expunge deletions left in segments outside the merged tail
        let mut idx = 0;
        while idx < self.segments.len() {
            if self.segments[idx].deleted.is_empty() {
                idx += 1;
                continue;
            }
            let before = self.segments.len();
            self.merge_range(idx, idx + 1)?;
            if self.segments.len() == before {
                idx += 1;
            }
        }

        self.dirty = true;
        tracing::info!(segments = self.segments.len(), "Force merge complete");
        Ok(())
    }

    fn commit_data(&self) -> BTreeMap<String, String> {
        self.user_data.clone()
    }

    fn set_commit_data(&mut self, data: BTreeMap<String, String>) {
        self.user_data = data;
        self.dirty = true;
    }

    fn commit(&mut self) -> StoreResult<u64> {
        self.flush_buffer()?;
        if !self.dirty {
            return Ok(self.infos.generation);
        }

        for seg in &mut self.segments {
            if seg.pending_deletes {
                let del_gen = seg.info.del_gen + 1;
                write_deletes(&self.dir, &seg.info.name, del_gen, &seg.deleted, seg.info.codec)?;
                seg.info.del_gen = del_gen;
                seg.info.del_count = seg.deleted.len();
                seg.pending_deletes = false;
            }
        }

        self.infos.segments = self.segments.iter().map(|s| s.info.clone()).collect();
        self.infos.user_data = self.user_data.clone();
        self.infos.generation += 1;
        self.infos.timestamp = chrono::Utc::now();
        self.infos.write(&self.dir)?;

        let removed = commit::delete_unreferenced(&self.dir, &self.infos)?;
        self.dirty = false;

        tracing::info!(
            dir = %self.dir.display(),
            generation = self.infos.generation,
            segments = self.segments.len(),
            num_docs = self.num_docs(),
            removed_files = removed,
            "Committed"
        );
        Ok(self.infos.generation)
    }

    fn num_docs(&self) -> u32 {
        self.segments.iter().map(|s| s.num_docs()).sum::<u32>() + self.buffer.doc_count()
    }

    fn max_doc(&self) -> u32 {
        self.segments.iter().map(|s| s.info.max_doc).sum::<u32>() + self.buffer.doc_count()
    }

    fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn close(mut self: Box<Self>) -> StoreResult<()> {
        self.commit()?;
        tracing::info!(dir = %self.dir.display(), "Closed index writer");
        Ok(())
    }
}

/// True when both paths resolve to the same existing directory
pub(crate) fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::Field;
    use tempfile::tempdir;

    fn doc(id: i64, color: &str) -> Document {
        Document::new()
            .with(Field::numeric_doc_value("id", id))
            .with(Field::string("color", color))
    }

    fn config(max_buffered_docs: usize) -> WriterConfig {
        WriterConfig {
            max_buffered_docs,
            ..WriterConfig::default()
        }
    }

    #[test]
    fn test_flush_by_buffer_size() {
        let dir = tempdir().unwrap();
        let mut writer = FsIndexWriter::open(dir.path(), config(2)).unwrap();
        for i in 0..5 {
            writer.add_document(doc(i, "red")).unwrap();
        }
        assert_eq!(writer.segment_count(), 2);
        assert_eq!(writer.num_docs(), 5);

        writer.commit().unwrap();
        assert_eq!(writer.segment_count(), 3);
        assert!(dir.path().join("segments_1").exists());
    }

    #[test]
    fn test_append_requires_index() {
        let dir = tempdir().unwrap();
        let result = FsIndexWriter::open(
            dir.path(),
            WriterConfig {
                open_mode: OpenMode::Append,
                ..WriterConfig::default()
            },
        );
        assert!(matches!(result, Err(StoreError::IndexNotFound(_))));
    }

    #[test]
    fn test_delete_by_term_persists_deletes() {
        let dir = tempdir().unwrap();
        let mut writer = FsIndexWriter::open(dir.path(), config(10)).unwrap();
        for i in 0..4 {
            writer
                .add_document(doc(i, if i % 2 == 0 { "red" } else { "blue" }))
                .unwrap();
        }
        writer.commit().unwrap();

        assert_eq!(writer.delete_by_term("color", "red").unwrap(), 2);
        assert_eq!(writer.delete_by_term("color", "red").unwrap(), 0);
        writer.commit().unwrap();
        drop(writer);

        let infos = SegmentInfos::read_latest(dir.path()).unwrap();
        assert_eq!(infos.generation, 2);
        assert_eq!(infos.segments[0].del_count, 2);
        assert!(dir.path().join("_0_1.del").exists());

        let writer = FsIndexWriter::open(dir.path(), config(10)).unwrap();
        assert_eq!(writer.num_docs(), 2);
    }

    #[test]
    fn test_delete_by_predicate_sees_global_ids() {
        let dir = tempdir().unwrap();
        let mut writer = FsIndexWriter::open(dir.path(), config(3)).unwrap();
        for i in 0..6 {
            writer.add_document(doc(i, "red")).unwrap();
        }

        let mut seen = Vec::new();
        let deleted = writer
            .delete_by_predicate(&mut |doc| {
                seen.push(doc);
                doc >= 4
            })
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);

        // deleted docs are not visited again
        seen.clear();
        writer
            .delete_by_predicate(&mut |doc| {
                seen.push(doc);
                false
            })
            .unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_force_merge_purges_deletes() {
        let dir = tempdir().unwrap();
        let mut writer = FsIndexWriter::open(dir.path(), config(2)).unwrap();
        for i in 0..6 {
            writer.add_document(doc(i, "red")).unwrap();
        }
        writer.delete_by_predicate(&mut |doc| doc % 3 == 0).unwrap();
        writer.force_merge(1).unwrap();
        writer.commit().unwrap();

        assert_eq!(writer.segment_count(), 1);
        assert_eq!(writer.num_docs(), 4);
        assert_eq!(writer.max_doc(), 4);

        let infos = SegmentInfos::read_latest(dir.path()).unwrap();
        assert_eq!(infos.segments.len(), 1);
        assert!(!infos.segments[0].has_deletions());
        assert!(!dir.path().join("_0.seg").exists());
    }

    #[test]
    fn test_force_merge_noop_keeps_clean_segments() {
        let dir = tempdir().unwrap();
        let mut writer = FsIndexWriter::open(dir.path(), config(10)).unwrap();
        writer.add_document(doc(1, "red")).unwrap();
        writer.commit().unwrap();

        writer.force_merge(1).unwrap();
        writer.commit().unwrap();
        let infos = SegmentInfos::read_latest(dir.path()).unwrap();
        assert_eq!(infos.segments[0].name, "_0");
    }

    #[test]
    fn test_create_discards_existing() {
        let dir = tempdir().unwrap();
        {
            let mut writer = FsIndexWriter::open(dir.path(), config(10)).unwrap();
            writer.add_document(doc(1, "red")).unwrap();
            Box::new(writer).close().unwrap();
        }

        let writer = FsIndexWriter::open(
            dir.path(),
            WriterConfig {
                open_mode: OpenMode::Create,
                ..config(10)
            },
        )
        .unwrap();
        assert_eq!(writer.num_docs(), 0);
        Box::new(writer).close().unwrap();

        let infos = SegmentInfos::read_latest(dir.path()).unwrap();
        assert!(infos.segments.is_empty());
        assert!(!dir.path().join("_0.seg").exists());
    }

    #[test]
    fn test_commit_data() {
        let dir = tempdir().unwrap();
        let mut writer = FsIndexWriter::open(dir.path(), config(10)).unwrap();
        let mut data = writer.commit_data();
        data.insert("epoch".to_string(), "7".to_string());
        writer.set_commit_data(data);
        writer.commit().unwrap();

        let infos = SegmentInfos::read_latest(dir.path()).unwrap();
        assert_eq!(infos.user_data["epoch"], "7");
    }
}
