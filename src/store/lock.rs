//! Single-writer lock on an index directory
//!
//! Held by a writer for its whole life. On unix this is an exclusive
//! non-blocking `flock` on `write.lock`, released when the lock is dropped.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::store::commit::LOCK_FILE_NAME;
use crate::store::error::{StoreError, StoreResult};

#[derive(Debug)]
pub struct WriteLock {
    file: File,
    path: PathBuf,
}

impl WriteLock {
    /// Acquire the lock for `dir`, failing with `LockHeld` if taken
    pub fn acquire(dir: &Path) -> StoreResult<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB};

            let fd = file.as_raw_fd();
            // SAFETY: fd is a valid descriptor owned by `file`.
            if unsafe { flock(fd, LOCK_EX | LOCK_NB) } != 0 {
                return Err(StoreError::LockHeld(path));
            }
        }

        tracing::debug!(path = %path.display(), "Acquired write lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            // SAFETY: fd is still owned by `self.file`.
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
        tracing::debug!(path = %self.path.display(), "Released write lock");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let lock = WriteLock::acquire(dir.path()).unwrap();
        assert!(matches!(
            WriteLock::acquire(dir.path()),
            Err(StoreError::LockHeld(_))
        ));

        drop(lock);
        assert!(WriteLock::acquire(dir.path()).is_ok());
    }
}
