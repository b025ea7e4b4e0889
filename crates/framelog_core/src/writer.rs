//! Per-session segment writer.
//!
//! A `SegmentWriter` owns exactly one session's on-disk state: the open
//! append segment, the content-byte counter driving rotation, and the
//! persisted monotonic sequence counter. It is exclusively owned by that
//! session's supervisor and never shared.

use crate::compress::compress_artifact;
use crate::config::LogConfig;
use crate::error::{CoreError, CoreResult};
use crate::frame::{FrameRecord, LogFrame};
use framelog_storage::{FileBackend, SegmentBackend};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Appends a suffix to a base path without touching existing extensions.
fn sibling(base: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", base.display(), suffix))
}

/// Writes one session's frames to its open segment and rotates it when the
/// content-byte threshold is crossed.
pub struct SegmentWriter {
    session_id: String,
    base: PathBuf,
    tmp_path: PathBuf,
    seq_path: PathBuf,
    backend: Box<dyn SegmentBackend>,
    bytes_since_rotation: u64,
    last_sequence: u64,
    last_stamp: u64,
    max_segment_bytes: u64,
    sync_on_rotate: bool,
    compress: bool,
    compression_level: i32,
}

impl SegmentWriter {
    /// Opens the writer for a session under its deterministic base path.
    ///
    /// Recovers `last_sequence` from the `<base>.seq` side-file if one
    /// exists, so a restarted process resumes numbering without collision.
    /// A leftover open segment from a prior run is continued, and its size
    /// counts toward the rotation threshold so it still rotates promptly.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment file cannot be opened or the
    /// side-file is unreadable.
    pub fn open(base: PathBuf, session_id: &str, config: &LogConfig) -> CoreResult<Self> {
        let tmp_path = sibling(&base, "tmp");
        let seq_path = sibling(&base, "seq");

        let last_sequence = load_sequence(&seq_path)?;
        let backend = FileBackend::open_with_create_dirs(&tmp_path)?;
        let bytes_since_rotation = backend.len()?;

        Ok(Self {
            session_id: session_id.to_string(),
            base,
            tmp_path,
            seq_path,
            backend: Box::new(backend),
            bytes_since_rotation,
            last_sequence,
            last_stamp: 0,
            max_segment_bytes: config.max_segment_bytes,
            sync_on_rotate: config.sync_on_rotate,
            compress: config.compress,
            compression_level: config.compression_level,
        })
    }

    /// Builds a writer over an injected backend, for unit tests.
    #[cfg(test)]
    pub(crate) fn with_backend(
        base: PathBuf,
        session_id: &str,
        backend: Box<dyn SegmentBackend>,
        config: &LogConfig,
    ) -> Self {
        let tmp_path = sibling(&base, "tmp");
        let seq_path = sibling(&base, "seq");
        Self {
            session_id: session_id.to_string(),
            base,
            tmp_path,
            seq_path,
            backend,
            bytes_since_rotation: 0,
            last_sequence: 0,
            last_stamp: 0,
            max_segment_bytes: config.max_segment_bytes,
            sync_on_rotate: config.sync_on_rotate,
            compress: config.compress,
            compression_level: config.compression_level,
        }
    }

    /// Appends one frame to the open segment.
    ///
    /// Frames carrying sequence 0 are assigned `last_sequence + 1`; a
    /// producer-supplied sequence is kept as-is. Either way the counter
    /// advances so later assignments never collide. The rotation counter
    /// advances by the **content** length, not the serialized line length.
    ///
    /// Returns the sequence the frame was written under.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the backend append fails; the
    /// sequence counter is not consumed in that case.
    pub fn append(&mut self, frame: &LogFrame) -> CoreResult<u64> {
        let seq = if frame.sequence == 0 {
            self.last_sequence + 1
        } else {
            frame.sequence
        };

        let line = FrameRecord::from_frame(frame, seq).encode_line()?;
        self.backend.append(&line)?;

        self.last_sequence = self.last_sequence.max(seq);
        self.bytes_since_rotation += frame.content.len() as u64;
        Ok(seq)
    }

    /// Returns true once cumulative content bytes reach the threshold.
    #[must_use]
    pub fn needs_rotation(&self) -> bool {
        self.bytes_since_rotation >= self.max_segment_bytes
    }

    /// Rotates the open segment and returns the finalized artifact path.
    ///
    /// Flushes (and fsyncs when configured), renames the segment to a
    /// stamped artifact, reopens a fresh empty segment at the same base
    /// path, persists the sequence side-file, and compresses the artifact
    /// when enabled.
    ///
    /// If compression fails the uncompressed artifact stands and is
    /// returned. A failed side-file write is logged; the sequence is
    /// persisted again at close. If anything before the rename fails, the
    /// writer keeps appending to the existing segment and rotation is
    /// retried on the next threshold crossing. If the fresh segment cannot
    /// be opened after the rename, the rename is undone so the artifact is
    /// not stranded outside the handoff path.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing, renaming, or reopening fails.
    pub fn rotate(&mut self) -> CoreResult<PathBuf> {
        self.backend.flush()?;
        if self.sync_on_rotate {
            self.backend.sync()?;
        }

        let stamp = self.next_stamp();
        let mut artifact = sibling(&self.base, &format!("{stamp}.log"));
        fs::rename(&self.tmp_path, &artifact)?;

        // Old handle drops with the swap; the rename already happened.
        match FileBackend::open(&self.tmp_path) {
            Ok(fresh) => self.backend = Box::new(fresh),
            Err(e) => {
                // Put the segment back so appends keep landing in a live
                // file and the artifact cannot be stranded unpublished
                if let Err(undo) = fs::rename(&artifact, &self.tmp_path) {
                    tracing::error!(
                        error = %undo,
                        session = %self.session_id,
                        artifact = %artifact.display(),
                        "failed to restore segment after reopen failure"
                    );
                }
                return Err(e.into());
            }
        }
        self.bytes_since_rotation = 0;

        if let Err(e) = self.persist_sequence() {
            // Persisted again at close; a crash before then may reassign
            // sequences that were never published
            tracing::warn!(
                error = %e,
                session = %self.session_id,
                "failed to persist sequence side-file"
            );
        }

        if self.compress {
            match compress_artifact(&artifact, self.compression_level) {
                Ok(compressed) => artifact = compressed,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        session = %self.session_id,
                        artifact = %artifact.display(),
                        "segment compression failed; keeping uncompressed artifact"
                    );
                }
            }
        }

        Ok(artifact)
    }

    /// Flushes the segment and persists the sequence side-file.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or the side-file write fails.
    pub fn close(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        if self.sync_on_rotate {
            self.backend.sync()?;
        }
        self.persist_sequence()
    }

    /// The session this writer belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Last assigned or observed sequence number.
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Content bytes accumulated since the last rotation.
    #[must_use]
    pub fn bytes_since_rotation(&self) -> u64 {
        self.bytes_since_rotation
    }

    /// Rewrites `<base>.seq` atomically (write temp, rename over).
    fn persist_sequence(&self) -> CoreResult<()> {
        let temp = sibling(&self.base, "seq.tmp");
        fs::write(&temp, format!("{}\n", self.last_sequence))?;
        fs::rename(&temp, &self.seq_path)?;
        Ok(())
    }

    /// Pins the stamp counter, so tests can predict the next artifact name.
    #[cfg(test)]
    pub(crate) fn set_last_stamp(&mut self, stamp: u64) {
        self.last_stamp = stamp;
    }

    /// Millisecond wall-clock stamp, forced monotonic so two rotations in
    /// the same millisecond cannot produce colliding artifact names.
    fn next_stamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_stamp = now.max(self.last_stamp + 1);
        self.last_stamp
    }
}

impl std::fmt::Debug for SegmentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentWriter")
            .field("session_id", &self.session_id)
            .field("bytes_since_rotation", &self.bytes_since_rotation)
            .field("last_sequence", &self.last_sequence)
            .finish_non_exhaustive()
    }
}

fn load_sequence(seq_path: &Path) -> CoreResult<u64> {
    match fs::read_to_string(seq_path) {
        Ok(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|e| CoreError::sequence_corrupt(format!("{}: {e}", seq_path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}
