//! In-memory segment backend for testing.

use crate::backend::SegmentBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// An in-memory segment backend.
///
/// Suitable for unit tests and ephemeral pipelines that don't need
/// persistence. Contents can be shared with the test through a handle that
/// stays valid after the backend is moved into a writer, and write failures
/// can be injected to exercise error paths.
///
/// # Example
///
/// ```rust
/// use framelog_storage::{SegmentBackend, MemoryBackend};
///
/// let mut backend = MemoryBackend::new();
/// let contents = backend.contents_handle();
///
/// backend.append(b"line\n").unwrap();
/// assert_eq!(contents.lock().as_slice(), b"line\n");
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Arc<Mutex<Vec<u8>>>,
    fail_appends: usize,
    fail_flushes: usize,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            fail_appends: 0,
            fail_flushes: 0,
        }
    }

    /// Returns a handle to the backend's contents.
    ///
    /// The handle observes appends made after the backend has been moved
    /// into a writer.
    #[must_use]
    pub fn contents_handle(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.data)
    }

    /// Returns a copy of all appended data.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// Makes the next `count` appends fail with an injected error.
    ///
    /// Used by tests to simulate single-frame disk write failures.
    pub fn fail_next_appends(&mut self, count: usize) {
        self.fail_appends = count;
    }

    /// Makes the next `count` flushes fail with an injected error.
    ///
    /// Used by tests to simulate a failure at the start of rotation.
    pub fn fail_next_flushes(&mut self, count: usize) {
        self.fail_flushes = count;
    }
}

impl SegmentBackend for MemoryBackend {
    fn append(&mut self, data: &[u8]) -> StorageResult<()> {
        if self.fail_appends > 0 {
            self.fail_appends -= 1;
            return Err(StorageError::Injected);
        }
        self.data.lock().extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.fail_flushes > 0 {
            self.fail_flushes -= 1;
            return Err(StorageError::Injected);
        }
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        // No durable media behind this backend
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.data.lock().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_contents() {
        let mut backend = MemoryBackend::new();
        backend.append(b"a\n").unwrap();
        backend.append(b"b\n").unwrap();
        assert_eq!(backend.contents(), b"a\nb\n");
        assert_eq!(backend.len().unwrap(), 4);
    }

    #[test]
    fn with_data_resumes() {
        let backend = MemoryBackend::with_data(b"existing\n".to_vec());
        assert_eq!(backend.len().unwrap(), 9);
        assert!(!backend.is_empty().unwrap());
    }

    #[test]
    fn injected_failure_is_transient() {
        let mut backend = MemoryBackend::new();
        backend.fail_next_appends(1);

        assert!(matches!(
            backend.append(b"lost\n"),
            Err(StorageError::Injected)
        ));

        // Next append succeeds and the failed bytes never landed
        backend.append(b"kept\n").unwrap();
        assert_eq!(backend.contents(), b"kept\n");
    }

    #[test]
    fn injected_flush_failure_is_transient() {
        let mut backend = MemoryBackend::new();
        backend.fail_next_flushes(1);

        backend.append(b"data\n").unwrap();
        assert!(matches!(backend.flush(), Err(StorageError::Injected)));

        // Appended data is untouched and the next flush succeeds
        backend.flush().unwrap();
        assert_eq!(backend.contents(), b"data\n");
    }

    #[test]
    fn handle_observes_appends() {
        let mut backend = MemoryBackend::new();
        let handle = backend.contents_handle();

        backend.append(b"visible\n").unwrap();
        assert_eq!(handle.lock().as_slice(), b"visible\n");
    }
}
