//! Commit points
//!
//! Each commit is a `segments_<gen>` JSON file listing the segments that
//! make up the index at that generation, with their deletion generation,
//! plus free-form user data. The file with the highest generation is the
//! current state of the index. Commits are written to a pending file and
//! renamed into place, so a reader never observes a half-written commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::store::error::{StoreError, StoreResult};
use crate::store::segment::{deletes_file_name, segment_file_name};
use crate::store::types::Codec;

const COMMIT_PREFIX: &str = "segments_";
const PENDING_PREFIX: &str = "pending_segments_";
pub const LOCK_FILE_NAME: &str = "write.lock";

/// One segment as recorded in a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCommitInfo {
    /// Segment name, e.g. `_3`
    pub name: String,
    pub codec: Codec,
    pub max_doc: u32,
    pub del_count: u32,
    /// Generation of the deletion file, 0 when the segment has no deletions
    pub del_gen: u64,
}

impl SegmentCommitInfo {
    pub fn num_docs(&self) -> u32 {
        self.max_doc - self.del_count
    }

    pub fn has_deletions(&self) -> bool {
        self.del_count > 0
    }

    /// Files this segment needs on disk
    pub fn files(&self) -> Vec<String> {
        let mut files = vec![segment_file_name(&self.name)];
        if self.del_gen > 0 {
            files.push(deletes_file_name(&self.name, self.del_gen));
        }
        files
    }
}

/// The content of one `segments_<gen>` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfos {
    pub generation: u64,
    /// Next segment number to hand out
    pub counter: u64,
    pub segments: Vec<SegmentCommitInfo>,
    pub user_data: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl SegmentInfos {
    /// State of a directory before its first commit
    pub fn empty() -> Self {
        Self {
            generation: 0,
            counter: 0,
            segments: Vec::new(),
            user_data: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn next_segment_name(&mut self) -> String {
        let name = format!("_{}", self.counter);
        self.counter += 1;
        name
    }

    pub fn num_docs(&self) -> u32 {
        self.segments.iter().map(|s| s.num_docs()).sum()
    }

    pub fn max_doc(&self) -> u32 {
        self.segments.iter().map(|s| s.max_doc).sum()
    }

    /// Every file referenced by this commit, the commit file included
    pub fn files(&self) -> BTreeSet<String> {
        let mut files: BTreeSet<String> =
            self.segments.iter().flat_map(|s| s.files()).collect();
        if self.generation > 0 {
            files.insert(commit_file_name(self.generation));
        }
        files
    }

    /// Read the newest commit in `dir`
    pub fn read_latest(dir: &Path) -> StoreResult<Self> {
        let generation = latest_generation(dir)?
            .ok_or_else(|| StoreError::IndexNotFound(dir.to_path_buf()))?;
        Self::read(dir, generation)
    }

    pub fn read(dir: &Path, generation: u64) -> StoreResult<Self> {
        let bytes = fs::read(dir.join(commit_file_name(generation)))?;
        let infos: SegmentInfos = serde_json::from_slice(&bytes)?;
        if infos.generation != generation {
            return Err(StoreError::Corruption(format!(
                "Commit file {} records generation {}",
                commit_file_name(generation),
                infos.generation
            )));
        }
        Ok(infos)
    }

    /// Write this commit as `segments_<generation>`
    pub fn write(&self, dir: &Path) -> StoreResult<()> {
        let pending = dir.join(format!("{}{}", PENDING_PREFIX, self.generation));
        let json = serde_json::to_vec_pretty(self)?;
        {
            let mut file = File::create(&pending)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&pending, dir.join(commit_file_name(self.generation)))?;
        Ok(())
    }
}

pub fn commit_file_name(generation: u64) -> String {
    format!("{}{}", COMMIT_PREFIX, generation)
}

/// Highest commit generation present in `dir`, if any
pub fn latest_generation(dir: &Path) -> StoreResult<Option<u64>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut latest = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(generation) = name
            .strip_prefix(COMMIT_PREFIX)
            .and_then(|g| g.parse::<u64>().ok())
        {
            latest = latest.max(Some(generation));
        }
    }
    Ok(latest)
}

/// Remove index files that `keep` does not reference
///
/// Returns the number of files removed.
pub fn delete_unreferenced(dir: &Path, keep: &SegmentInfos) -> StoreResult<usize> {
    let referenced = keep.files();
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name == LOCK_FILE_NAME || referenced.contains(name) || !is_index_file(name) {
            continue;
        }
        fs::remove_file(entry.path())?;
        removed += 1;
    }
    Ok(removed)
}

/// Remove every index file, used when an index is re-created
pub fn delete_all(dir: &Path) -> StoreResult<usize> {
    delete_unreferenced(dir, &SegmentInfos::empty())
}

fn is_index_file(name: &str) -> bool {
    name.starts_with(COMMIT_PREFIX)
        || name.starts_with(PENDING_PREFIX)
        || (name.starts_with('_') && (name.ends_with(".seg") || name.ends_with(".del")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn segment(name: &str, max_doc: u32, del_count: u32, del_gen: u64) -> SegmentCommitInfo {
        SegmentCommitInfo {
            name: name.to_string(),
            codec: Codec::Binary,
            max_doc,
            del_count,
            del_gen,
        }
    }

    #[test]
    fn test_no_commit() {
        let dir = tempdir().unwrap();
        assert_eq!(latest_generation(dir.path()).unwrap(), None);
        assert!(matches!(
            SegmentInfos::read_latest(dir.path()),
            Err(StoreError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_write_and_read_latest() {
        let dir = tempdir().unwrap();
        let mut infos = SegmentInfos::empty();
        infos.generation = 1;
        infos.segments.push(segment("_0", 10, 0, 0));
        infos.write(dir.path()).unwrap();

        infos.generation = 2;
        infos.segments.push(segment("_1", 5, 2, 1));
        infos.user_data.insert("owner".into(), "ops".into());
        infos.write(dir.path()).unwrap();

        let latest = SegmentInfos::read_latest(dir.path()).unwrap();
        assert_eq!(latest.generation, 2);
        assert_eq!(latest.num_docs(), 13);
        assert_eq!(latest.max_doc(), 15);
        assert_eq!(latest.user_data["owner"], "ops");
        assert!(!dir.path().join("pending_segments_2").exists());
    }

    #[test]
    fn test_delete_unreferenced() {
        let dir = tempdir().unwrap();
        for name in ["_0.seg", "_1.seg", "_1_1.del", "_1_2.del", "segments_1", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::write(dir.path().join(LOCK_FILE_NAME), b"").unwrap();

        let mut keep = SegmentInfos::empty();
        keep.generation = 2;
        keep.segments.push(segment("_1", 5, 1, 2));

        let removed = delete_unreferenced(dir.path(), &keep).unwrap();
        assert_eq!(removed, 3);
        assert!(dir.path().join("_1.seg").exists());
        assert!(dir.path().join("_1_2.del").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join(LOCK_FILE_NAME).exists());
        assert!(!dir.path().join("segments_1").exists());
    }
}
