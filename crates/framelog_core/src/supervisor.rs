//! Per-session background worker.

use crate::buffer::{FrameBuffer, Popped};
use crate::config::HandoffConfig;
use crate::frame::LogFrame;
use crate::pending::PendingIndex;
use crate::queue::HandoffQueue;
use crate::writer::SegmentWriter;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a pop waits before re-checking close and idle signals.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drains one session's bounded buffer and drives its segment writer.
///
/// The supervisor exclusively owns the session's writer, so rotation is only
/// ever invoked synchronously from this one thread: no two rotations for the
/// same session can race, and no frame can be appended to a file that is
/// concurrently being rotated.
///
/// Failure semantics: a failure to append a single frame is logged and the
/// frame dropped; a failure during rotation is logged and the supervisor
/// keeps appending to the existing segment, retrying rotation on the next
/// threshold crossing; a failure to publish leaves the artifact on disk and
/// records it in the pending index. None of these are fatal.
pub struct SessionSupervisor {
    buffer: Arc<FrameBuffer>,
    writer: SegmentWriter,
    handoff: Option<(Arc<dyn HandoffQueue>, HandoffConfig)>,
    pending: Arc<PendingIndex>,
}

impl SessionSupervisor {
    /// Creates a supervisor over a session's buffer and writer.
    pub fn new(
        buffer: Arc<FrameBuffer>,
        writer: SegmentWriter,
        handoff: Option<(Arc<dyn HandoffQueue>, HandoffConfig)>,
        pending: Arc<PendingIndex>,
    ) -> Self {
        Self {
            buffer,
            writer,
            handoff,
            pending,
        }
    }

    /// Spawns the supervisor on its own named thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        let name = format!("framelog-{}", self.writer.session_id());
        thread::Builder::new().name(name).spawn(move || self.run())
    }

    /// Runs the drain loop until the buffer is closed and empty.
    pub fn run(mut self) {
        loop {
            match self.buffer.pop(POLL_INTERVAL) {
                Popped::Frame(frame) => self.handle_frame(&frame),
                Popped::TimedOut => continue,
                Popped::Closed => break,
            }
        }

        if let Err(e) = self.writer.close() {
            tracing::warn!(
                error = %e,
                session = %self.writer.session_id(),
                "failed to close segment writer cleanly"
            );
        }
    }

    fn handle_frame(&mut self, frame: &LogFrame) {
        match self.writer.append(frame) {
            Ok(seq) => {
                tracing::trace!(
                    session = %self.writer.session_id(),
                    seq,
                    bytes = frame.content.len(),
                    "frame appended"
                );
            }
            Err(e) => {
                // Non-fatal: the frame is dropped, the loop continues
                tracing::warn!(
                    error = %e,
                    session = %self.writer.session_id(),
                    "failed to append frame; dropping it"
                );
                return;
            }
        }

        if self.writer.needs_rotation() {
            self.rotate_and_publish();
        }
    }

    fn rotate_and_publish(&mut self) {
        let artifact = match self.writer.rotate() {
            Ok(artifact) => artifact,
            Err(e) => {
                // Keep appending to the oversized segment; rotation is
                // retried on the next threshold crossing
                tracing::warn!(
                    error = %e,
                    session = %self.writer.session_id(),
                    "rotation failed; continuing on existing segment"
                );
                return;
            }
        };

        tracing::info!(
            session = %self.writer.session_id(),
            artifact = %artifact.display(),
            "segment rotated"
        );

        let Some((queue, config)) = &self.handoff else {
            return;
        };

        let path = artifact.display().to_string();
        if let Err(e) = queue.publish(&config.queue_name, &path, config.ttl) {
            // Best-effort handoff: the artifact stays on disk and is
            // retried from the pending index
            tracing::warn!(
                error = %e,
                session = %self.writer.session_id(),
                artifact = %path,
                "handoff publish failed; recorded for retry"
            );
            if let Err(e) = self.pending.record(&artifact) {
                tracing::warn!(error = %e, artifact = %path, "failed to record pending artifact");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogConfig, OverflowPolicy};
    use crate::frame::FrameRecord;
    use crate::queue::InMemoryHandoffQueue;
    use framelog_storage::MemoryBackend;
    use tempfile::tempdir;

    fn frame(content: &str) -> LogFrame {
        LogFrame::new("s1", 42, "alice", "user", content)
    }

    fn pending_in(dir: &std::path::Path) -> Arc<PendingIndex> {
        Arc::new(PendingIndex::open(dir.join("pending.handoff")).unwrap())
    }

    #[test]
    fn drains_rotates_and_publishes() {
        let dir = tempdir().unwrap();
        let config = LogConfig::new(dir.path())
            .max_segment_bytes(3)
            .compress(false);

        let buffer = Arc::new(FrameBuffer::new(16, OverflowPolicy::DropOldest));
        let writer = SegmentWriter::open(dir.path().join("s1"), "s1", &config).unwrap();
        let queue = Arc::new(InMemoryHandoffQueue::new());
        let handoff = HandoffConfig::new("artifacts").ttl(Duration::from_secs(30));

        buffer.push(frame("a"));
        buffer.push(frame("b"));
        buffer.push(frame("c"));
        buffer.close();

        SessionSupervisor::new(
            Arc::clone(&buffer),
            writer,
            Some((queue.clone() as Arc<dyn HandoffQueue>, handoff)),
            pending_in(dir.path()),
        )
        .run();

        // 3 content bytes crossed the threshold: exactly one artifact
        let entries = queue.entries("artifacts");
        assert_eq!(entries.len(), 1);
        assert_eq!(queue.ttl_of("artifacts"), Some(Duration::from_secs(30)));

        // Records appear in send order
        let text = std::fs::read_to_string(&entries[0]).unwrap();
        let contents: Vec<String> = text
            .lines()
            .map(|l| FrameRecord::decode_line(l).unwrap().content)
            .collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[test]
    fn publish_failure_records_pending() {
        let dir = tempdir().unwrap();
        let config = LogConfig::new(dir.path())
            .max_segment_bytes(1)
            .compress(false);

        let buffer = Arc::new(FrameBuffer::new(16, OverflowPolicy::DropOldest));
        let writer = SegmentWriter::open(dir.path().join("s1"), "s1", &config).unwrap();
        let queue = Arc::new(InMemoryHandoffQueue::new());
        queue.set_failing(true);
        let pending = pending_in(dir.path());

        buffer.push(frame("x"));
        buffer.close();

        SessionSupervisor::new(
            Arc::clone(&buffer),
            writer,
            Some((
                queue.clone() as Arc<dyn HandoffQueue>,
                HandoffConfig::new("artifacts"),
            )),
            Arc::clone(&pending),
        )
        .run();

        // The artifact exists on disk and is tracked for retry
        assert_eq!(pending.len(), 1);
        assert!(queue.entries("artifacts").is_empty());

        queue.set_failing(false);
        assert_eq!(pending.retry(queue.as_ref(), "artifacts", Duration::ZERO), 0);
        assert_eq!(queue.entries("artifacts").len(), 1);
    }

    #[test]
    fn rotation_failure_does_not_stop_draining() {
        let dir = tempdir().unwrap();
        let config = LogConfig::new(dir.path())
            .max_segment_bytes(1)
            .compress(false);

        // No segment file exists on disk, so every rotation attempt fails
        // at the rename while appends keep landing in the backend
        let backend = MemoryBackend::new();
        let contents = backend.contents_handle();
        let writer = SegmentWriter::with_backend(
            dir.path().join("s1"),
            "s1",
            Box::new(backend),
            &config,
        );

        let buffer = Arc::new(FrameBuffer::new(16, OverflowPolicy::DropOldest));
        buffer.push(frame("a"));
        buffer.push(frame("b"));
        buffer.close();

        SessionSupervisor::new(Arc::clone(&buffer), writer, None, pending_in(dir.path())).run();

        let text = String::from_utf8(contents.lock().clone()).unwrap();
        let written: Vec<String> = text
            .lines()
            .map(|l| FrameRecord::decode_line(l).unwrap().content)
            .collect();
        assert_eq!(written, vec!["a", "b"]);
    }

    #[test]
    fn compression_failure_publishes_uncompressed_artifact() {
        let dir = tempdir().unwrap();
        let config = LogConfig::new(dir.path()).max_segment_bytes(1);

        let mut writer = SegmentWriter::open(dir.path().join("s1"), "s1", &config).unwrap();
        // Pin the next rotation stamp and block its compressed destination
        writer.set_last_stamp(4_000_000_000_000_000);
        std::fs::create_dir(dir.path().join("s1.4000000000000001.log.zst")).unwrap();

        let queue = Arc::new(InMemoryHandoffQueue::new());
        let buffer = Arc::new(FrameBuffer::new(16, OverflowPolicy::DropOldest));
        buffer.push(frame("x"));
        buffer.close();

        SessionSupervisor::new(
            Arc::clone(&buffer),
            writer,
            Some((
                queue.clone() as Arc<dyn HandoffQueue>,
                HandoffConfig::new("artifacts"),
            )),
            pending_in(dir.path()),
        )
        .run();

        // The uncompressed artifact stands and is the one handed off
        let entries = queue.entries("artifacts");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with(".log"));
        assert!(std::path::Path::new(&entries[0]).exists());
    }

    #[test]
    fn single_frame_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let config = LogConfig::default();

        let mut backend = MemoryBackend::new();
        backend.fail_next_appends(1);
        let contents = backend.contents_handle();

        let writer = SegmentWriter::with_backend(
            dir.path().join("s1"),
            "s1",
            Box::new(backend),
            &config,
        );
        let buffer = Arc::new(FrameBuffer::new(16, OverflowPolicy::DropOldest));

        buffer.push(frame("doomed"));
        buffer.push(frame("survivor"));
        buffer.close();

        SessionSupervisor::new(Arc::clone(&buffer), writer, None, pending_in(dir.path())).run();

        let text = String::from_utf8(contents.lock().clone()).unwrap();
        assert!(!text.contains("doomed"));
        assert!(text.contains("survivor"));
    }

    #[test]
    fn spawned_supervisor_drains_then_exits() {
        let dir = tempdir().unwrap();
        let config = LogConfig::new(dir.path()).max_segment_bytes(u64::MAX);

        let buffer = Arc::new(FrameBuffer::new(16, OverflowPolicy::DropOldest));
        let writer = SegmentWriter::open(dir.path().join("s1"), "s1", &config).unwrap();

        let handle = SessionSupervisor::new(
            Arc::clone(&buffer),
            writer,
            None,
            pending_in(dir.path()),
        )
        .spawn()
        .unwrap();

        buffer.push(frame("late frame"));
        buffer.close();
        handle.join().unwrap();

        let text = std::fs::read_to_string(dir.path().join("s1.tmp")).unwrap();
        assert!(text.contains("late frame"));
    }
}
