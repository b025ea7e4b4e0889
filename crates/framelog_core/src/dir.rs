//! Log directory management.
//!
//! This module handles the file system layout for FrameLog:
//!
//! ```text
//! <log_dir>/
//! ├─ LOCK                      # Advisory lock for single-writer
//! ├─ pending.handoff           # Artifacts awaiting a queue push retry
//! ├─ <session>.tmp             # Currently open segment (JSON lines)
//! ├─ <session>.seq             # Last-assigned sequence number
//! └─ <session>.<stamp>.log[.zst]  # Finalized artifacts
//! ```
//!
//! The LOCK file ensures only one process writes the directory at a time;
//! the layout assumes a single writer on a single node.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const PENDING_FILE: &str = "pending.handoff";

/// Manages the log directory structure and file locking.
///
/// # Thread Safety
///
/// `LogDir` holds an exclusive advisory lock on the directory. Only one
/// instance can exist per directory at a time, across processes.
#[derive(Debug)]
pub struct LogDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl LogDir {
    /// Opens or creates a log directory and acquires its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - Another process holds the lock (returns [`CoreError::DirectoryLocked`])
    /// - I/O errors occur
    pub fn open(path: &Path) -> CoreResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| CoreError::DirectoryLocked)?;

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the deterministic base path for a session.
    ///
    /// The session id is sanitized to a file-safe name: ASCII alphanumerics,
    /// `-`, `_`, and `.` pass through; everything else becomes `_`. Ids the
    /// sanitizer alters also carry a hash of the raw id, so two distinct ids
    /// can never map to the same base path and thereby share segment or
    /// side-file state.
    #[must_use]
    pub fn base_path(&self, session_id: &str) -> PathBuf {
        self.path.join(base_name(session_id))
    }

    /// Returns the path of the pending-handoff index.
    #[must_use]
    pub fn pending_path(&self) -> PathBuf {
        self.path.join(PENDING_FILE)
    }
}

fn base_name(session_id: &str) -> String {
    let safe: String = session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe == session_id {
        safe
    } else {
        format!("{safe}-{:016x}", fnv1a(session_id.as_bytes()))
    }
}

/// FNV-1a, stable across processes so base paths survive restarts.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET_BASIS, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory_and_lock() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("logs");

        let log_dir = LogDir::open(&root).unwrap();
        assert!(root.join("LOCK").exists());
        assert_eq!(log_dir.path(), root);
    }

    #[test]
    fn second_open_is_refused() {
        let dir = tempdir().unwrap();

        let _held = LogDir::open(dir.path()).unwrap();
        let second = LogDir::open(dir.path());
        assert!(matches!(second, Err(CoreError::DirectoryLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempdir().unwrap();

        drop(LogDir::open(dir.path()).unwrap());
        assert!(LogDir::open(dir.path()).is_ok());
    }

    #[test]
    fn base_path_sanitizes() {
        let dir = tempdir().unwrap();
        let log_dir = LogDir::open(dir.path()).unwrap();

        let base = log_dir.base_path("user@host:42/run");
        let name = base.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("user_host_42_run-"));
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()
            || matches!(c, '-' | '_' | '.')));
    }

    #[test]
    fn altered_ids_never_alias() {
        let dir = tempdir().unwrap();
        let log_dir = LogDir::open(dir.path()).unwrap();

        // Both ids sanitize to "a_b"; the hash suffix keeps them apart
        let a = log_dir.base_path("a@b");
        let b = log_dir.base_path("a:b");
        assert_ne!(a, b);

        // The mapping is deterministic, so a restarted process finds the
        // same files
        assert_eq!(a, log_dir.base_path("a@b"));
    }

    #[test]
    fn base_path_keeps_safe_chars() {
        let dir = tempdir().unwrap();
        let log_dir = LogDir::open(dir.path()).unwrap();

        let base = log_dir.base_path("sess-01_b.2");
        assert_eq!(base.file_name().unwrap().to_str().unwrap(), "sess-01_b.2");
    }
}
