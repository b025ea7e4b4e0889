//! File-based segment backend for persistent storage.

use crate::backend::SegmentBackend;
use crate::error::StorageResult;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// A file-based segment backend.
///
/// Appends go through a [`BufWriter`] so that many small frame records do
/// not each pay a syscall. Data survives process restarts once flushed.
///
/// # Durability
///
/// - `flush()` drains the write buffer and calls `File::flush()`
/// - `sync()` additionally calls `File::sync_all()` to ensure data is on disk
///
/// # Example
///
/// ```no_run
/// use framelog_storage::{SegmentBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("session.tmp")).unwrap();
/// backend.append(b"record\n").unwrap();
/// backend.sync().unwrap();  // Ensure data is durable
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    writer: BufWriter<File>,
    size: u64,
}

impl FileBackend {
    /// Opens or creates a segment file at the given path in append mode.
    ///
    /// If the file exists its current size is picked up, so reopening a
    /// half-written segment continues where it left off.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            size,
        })
    }

    /// Opens or creates a segment file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SegmentBackend for FileBackend {
    fn append(&mut self, data: &[u8]) -> StorageResult<()> {
        self.writer.write_all(data)?;
        self.size += data.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.size)
    }
}
