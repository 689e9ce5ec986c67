//! Process-level locking of a project config.
//!
//! Two ingest runs against one project would allocate the same `raw <N>`
//! folder. Each run holds an exclusive advisory lock on
//! `ingest.conf.json.lock` for its whole duration; a second run fails fast.
//!
//! Uses the `fs2` crate for cross-platform file locking.

use crate::error::{IngestError, Result};
use chrono::Utc;
use fs2::FileExt;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Holds an exclusive lock until dropped.
pub struct ConfigLock {
    file: File,
    lock_path: PathBuf,
}

#[derive(Serialize)]
struct LockOwner {
    pid: u32,
    timestamp: String,
}

/// Get the lock file path for a config path.
///
/// - `/p/ingest.conf.json` → `/p/ingest.conf.json.lock`
/// - `/p/state` → `/p/state.lock`
pub fn lock_path_for(config_path: &Path) -> PathBuf {
    let mut lock_path = config_path.to_path_buf();
    match lock_path.extension() {
        Some(ext) => {
            let new_ext = format!("{}.lock", ext.to_string_lossy());
            lock_path.set_extension(new_ext);
        }
        None => {
            lock_path.set_extension("lock");
        }
    }
    lock_path
}

impl ConfigLock {
    /// Try to acquire the lock without waiting.
    pub fn try_acquire(config_path: &Path) -> Result<Self> {
        let lock_path = lock_path_for(config_path);
        debug!(path = %lock_path.display(), "Attempting to acquire config lock");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| IngestError::LockFailed {
                path: lock_path.clone(),
                source,
            })?;

        // Fully qualified so newer std's File::try_lock_exclusive is not picked
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                let mut lock = Self { file, lock_path };
                if let Err(e) = lock.write_owner() {
                    warn!(path = %lock.lock_path.display(), error = %e, "Failed to record lock owner");
                }
                info!(path = %lock.lock_path.display(), "Acquired config lock");
                Ok(lock)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || is_contended(&e) => {
                Err(IngestError::ProjectLocked(config_path.to_path_buf()))
            }
            Err(source) => Err(IngestError::LockFailed { path: lock_path, source }),
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn write_owner(&mut self) -> io::Result<()> {
        let owner = LockOwner {
            pid: std::process::id(),
            timestamp: Utc::now().to_rfc3339(),
        };
        let payload = serde_json::to_vec(&owner).map_err(io::Error::other)?;
        self.file.set_len(0)?;
        self.file.write_all(&payload)?;
        self.file.flush()
    }
}

/// `fs2` reports contention as the platform's lock error rather than WouldBlock
/// on some targets.
fn is_contended(e: &io::Error) -> bool {
    e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        debug!(path = %self.lock_path.display(), "Releasing config lock");
        // Never unlinked: every run must contend on the same inode
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(path = %self.lock_path.display(), error = %e, "Failed to unlock config lock");
        }
    }
}

impl std::fmt::Debug for ConfigLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLock")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}
