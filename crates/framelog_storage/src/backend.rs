//! Segment backend trait definition.

use crate::error::StorageResult;

/// A low-level append sink for one open segment.
///
/// Segment backends are **opaque byte sinks**. They provide simple operations
/// for appending, flushing, and syncing data. FrameLog owns all record format
/// interpretation - backends do not understand frames, sessions, or rotation.
///
/// # Invariants
///
/// - `append` writes the bytes after all previously appended bytes
/// - `flush` pushes buffered data to the OS
/// - `sync` ensures data and metadata are on durable media
/// - Backends must be `Send` so a session supervisor can own one on its
///   own thread; each backend is exclusively owned, never shared
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait SegmentBackend: Send {
    /// Appends data to the end of the segment.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Flushes all buffered writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - after this returns
    /// successfully, appended data survives process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size of the segment in bytes.
    ///
    /// Includes buffered data that has not yet been flushed.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn len(&self) -> StorageResult<u64>;

    /// Returns true if nothing has been appended yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}
