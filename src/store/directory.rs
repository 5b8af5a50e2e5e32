//! Filesystem-backed index handle factory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::handle::{CommitInfo, IndexHandleFactory, IndexReader, IndexWriter};
use crate::store::commit::{latest_generation, SegmentInfos};
use crate::store::error::{StoreError, StoreResult};
use crate::store::reader::DirectoryReader;
use crate::store::types::Codec;
use crate::store::writer::{same_location, FsIndexWriter, OpenMode, WriterConfig};

/// An index living in one directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FsDirectory {
    path: PathBuf,
    writer_config: WriterConfig,
}

impl FsDirectory {
    /// Open an existing index directory
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(StoreError::IndexNotFound(path));
        }
        Ok(Self {
            path,
            writer_config: WriterConfig {
                open_mode: OpenMode::Append,
                ..WriterConfig::default()
            },
        })
    }

    /// Codec used by writers this directory opens
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.writer_config.codec = codec;
        self
    }

    pub fn with_max_buffered_docs(mut self, max_buffered_docs: usize) -> Self {
        self.writer_config.max_buffered_docs = max_buffered_docs;
        self
    }

    /// Create a new index at `path` and return a writer over it
    pub fn create(path: &Path, codec: Codec, max_buffered_docs: usize) -> StoreResult<FsIndexWriter> {
        FsIndexWriter::open(
            path,
            WriterConfig {
                codec,
                max_buffered_docs,
                open_mode: OpenMode::Create,
            },
        )
    }
}

impl IndexHandleFactory for FsDirectory {
    fn location(&self) -> &Path {
        &self.path
    }

    fn describe(&self) -> String {
        format!("FsDirectory@{} lockFactory=flock", self.path.display())
    }

    fn open_reader(&self) -> StoreResult<Arc<dyn IndexReader>> {
        Ok(Arc::new(DirectoryReader::open(&self.path)?))
    }

    fn refresh(&self, current: &Arc<dyn IndexReader>) -> StoreResult<Arc<dyn IndexReader>> {
        match latest_generation(&self.path)? {
            Some(generation) if generation == current.generation() => Ok(Arc::clone(current)),
            _ => self.open_reader(),
        }
    }

    fn open_writer(&self) -> StoreResult<Box<dyn IndexWriter>> {
        Ok(Box::new(FsIndexWriter::open(
            &self.path,
            self.writer_config.clone(),
        )?))
    }

    fn latest_commit(&self) -> StoreResult<CommitInfo> {
        let infos = SegmentInfos::read_latest(&self.path)?;
        Ok(CommitInfo {
            generation: infos.generation,
            codec: infos.segments.first().map(|s| s.codec.name().to_string()),
            user_data: infos.user_data,
            segment_count: infos.segments.len(),
            timestamp: infos.timestamp,
        })
    }

    fn create_index(&self, target: &Path, codec: Codec) -> StoreResult<Box<dyn IndexWriter>> {
        if same_location(target, &self.path) {
            return Err(StoreError::InvalidArgument(format!(
                "target {} is the open index",
                target.display()
            )));
        }
        Ok(Box::new(Self::create(
            target,
            codec,
            self.writer_config.max_buffered_docs,
        )?))
    }
}
