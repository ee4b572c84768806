//! Process-exclusivity lock
//!
//! At most one live store may own a data file. Ownership is an advisory
//! exclusive `flock` on `<datafile>.lock`, taken non-blocking at open. The
//! lock file itself is left on disk after release.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use tracing::{debug, warn};

use snapkv_core::{StoreError, StoreResult};

/// Held exclusive lock on a data file
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ProcessLock {
    /// Try to take the lock at `lock_path` without blocking.
    ///
    /// Fails with `AlreadyLocked` if any other handle holds it, including
    /// another store in this same process.
    pub fn acquire(lock_path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = lock_path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            let contended = e.kind() == std::io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error();
            if contended {
                return Err(StoreError::AlreadyLocked(path));
            }
            return Err(StoreError::Io(e));
        }

        debug!(target: "snapkv::store", path = %path.display(), "Lock acquired");
        Ok(ProcessLock {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True until [`release`](Self::release) is called
    pub fn is_held(&self) -> bool {
        self.file.lock().is_some()
    }

    /// Release the lock. Calling this again is a no-op.
    pub fn release(&self) -> StoreResult<()> {
        let Some(file) = self.file.lock().take() else {
            return Ok(());
        };
        let result = FileExt::unlock(&file);
        drop(file);
        match result {
            Ok(()) => {
                debug!(target: "snapkv::store", path = %self.path.display(), "Lock released");
                Ok(())
            }
            Err(e) => {
                // Closing the descriptor still drops the flock
                warn!(
                    target: "snapkv::store",
                    path = %self.path.display(),
                    error = %e,
                    "Explicit unlock failed"
                );
                Err(StoreError::Io(e))
            }
        }
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
