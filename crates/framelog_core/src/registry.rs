//! Session registry and frame router.

use crate::buffer::{FrameBuffer, PushOutcome};
use crate::config::LogConfig;
use crate::dir::LogDir;
use crate::error::{CoreError, CoreResult};
use crate::frame::LogFrame;
use crate::pending::PendingIndex;
use crate::queue::HandoffQueue;
use crate::supervisor::SessionSupervisor;
use crate::writer::SegmentWriter;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Upper bound on how long the sweeper sleeps between passes.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome of routing one frame into the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The frame was accepted into its session's buffer.
    Enqueued,
    /// The frame was accepted; the session's oldest unwritten frame was
    /// evicted to make room.
    EvictedOldest,
    /// The frame was refused by the overflow policy.
    Rejected,
}

struct SessionHandle {
    buffer: Arc<FrameBuffer>,
    join: Option<JoinHandle<()>>,
    last_active: Instant,
}

/// Routes inbound frames to per-session supervisors, creating them lazily.
///
/// The registry holds the log directory lock, the per-session buffers, and
/// the supervisor thread handles. Each session's state is exclusively owned
/// by its own supervisor; the registry only touches the shared buffers.
///
/// Sessions are created on the first frame seen for a `session_id` and torn
/// down by [`close`](Self::close), by idle eviction (when `idle_timeout` is
/// configured), or by [`shutdown`](Self::shutdown). A background sweeper
/// drives idle eviction and retries pending handoffs on a timer.
pub struct SessionRegistry {
    config: LogConfig,
    dir: LogDir,
    sessions: Mutex<HashMap<String, SessionHandle>>,
    publisher: Option<Arc<dyn HandoffQueue>>,
    pending: Arc<PendingIndex>,
    evicted: AtomicU64,
    shutdown: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    sweeper_stop: Arc<(Mutex<bool>, Condvar)>,
}

impl SessionRegistry {
    /// Opens the registry: locks the log directory, loads the pending
    /// handoff index, and starts the sweeper when it has work to do.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be locked or the pending
    /// index cannot be read.
    pub fn new(
        config: LogConfig,
        publisher: Option<Arc<dyn HandoffQueue>>,
    ) -> CoreResult<Arc<Self>> {
        let dir = LogDir::open(&config.log_dir)?;
        let pending = Arc::new(PendingIndex::open(dir.pending_path())?);

        let registry = Arc::new(Self {
            config,
            dir,
            sessions: Mutex::new(HashMap::new()),
            publisher,
            pending,
            evicted: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            sweeper: Mutex::new(None),
            sweeper_stop: Arc::new((Mutex::new(false), Condvar::new())),
        });

        let wants_sweeper = !registry.config.idle_timeout.is_zero()
            || (registry.publisher.is_some() && registry.config.handoff.is_some());
        if wants_sweeper {
            let weak = Arc::downgrade(&registry);
            let stop = Arc::clone(&registry.sweeper_stop);
            let interval = if registry.config.idle_timeout.is_zero() {
                MAX_SWEEP_INTERVAL
            } else {
                registry.config.idle_timeout.min(MAX_SWEEP_INTERVAL)
            };
            let handle = std::thread::Builder::new()
                .name("framelog-sweeper".to_string())
                .spawn(move || sweeper_loop(&weak, &stop, interval))?;
            *registry.sweeper.lock() = Some(handle);
        }

        Ok(registry)
    }

    /// Routes one frame to its session, creating the session lazily.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame fails validation, the registry is shut
    /// down, the live-session cap is reached, or the session's writer cannot
    /// be opened.
    pub fn ingest(&self, frame: LogFrame) -> CoreResult<IngestOutcome> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(CoreError::ShutDown);
        }
        frame.validate()?;
        let session_id = frame.session_id.clone();

        // A session closed by idle eviction leaves a stale handle behind;
        // reap it so the same id can start a fresh session
        let stale = {
            let mut sessions = self.sessions.lock();
            match sessions.get(&session_id) {
                Some(handle) if handle.buffer.is_closed() => sessions.remove(&session_id),
                _ => None,
            }
        };
        if let Some(handle) = stale {
            join_supervisor(&session_id, handle);
        }

        let buffer = {
            let mut sessions = self.sessions.lock();
            if let Some(handle) = sessions.get_mut(&session_id) {
                handle.last_active = Instant::now();
                Arc::clone(&handle.buffer)
            } else {
                if sessions.len() >= self.config.max_sessions {
                    return Err(CoreError::SessionLimit {
                        limit: self.config.max_sessions,
                    });
                }
                let handle = self.create_session(&session_id)?;
                let buffer = Arc::clone(&handle.buffer);
                sessions.insert(session_id.clone(), handle);
                buffer
            }
        };

        match buffer.push(frame) {
            PushOutcome::Enqueued => Ok(IngestOutcome::Enqueued),
            PushOutcome::Evicted(old) => {
                self.evicted.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    session = %session_id,
                    dropped_time = old.time,
                    "buffer full; evicted oldest unwritten frame"
                );
                Ok(IngestOutcome::EvictedOldest)
            }
            PushOutcome::Rejected => Ok(IngestOutcome::Rejected),
            PushOutcome::Closed => {
                // Lost a race with close; treat like a refusal
                tracing::warn!(session = %session_id, "frame arrived while session was closing");
                Ok(IngestOutcome::Rejected)
            }
        }
    }

    /// Closes one session: its buffer stops accepting frames, the
    /// supervisor drains what is queued, flushes, and exits.
    pub fn close(&self, session_id: &str) {
        let removed = self.sessions.lock().remove(session_id);
        if let Some(handle) = removed {
            join_supervisor(session_id, handle);
        }
    }

    /// Closes every session idle for longer than `max_idle`.
    ///
    /// Returns the number of sessions closed.
    pub fn close_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let idle: Vec<(String, SessionHandle)> = {
            let mut sessions = self.sessions.lock();
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, h)| now.duration_since(h.last_active) >= max_idle)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|h| (id, h)))
                .collect()
        };

        let count = idle.len();
        for (id, handle) in idle {
            tracing::info!(session = %id, "closing idle session");
            join_supervisor(&id, handle);
        }
        count
    }

    /// Shuts the registry down: refuses new frames, closes all sessions,
    /// stops the sweeper, and makes a final pending-handoff retry pass.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        // Stop the sweeper first so it cannot race session teardown
        {
            let (lock, condvar) = &*self.sweeper_stop;
            *lock.lock() = true;
            condvar.notify_all();
        }
        if let Some(handle) = self.sweeper.lock().take() {
            if handle.join().is_err() {
                tracing::error!("sweeper thread panicked during shutdown");
            }
        }

        let drained: Vec<(String, SessionHandle)> =
            self.sessions.lock().drain().collect();
        for (id, handle) in drained {
            join_supervisor(&id, handle);
        }

        self.retry_pending();
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Total frames evicted by the drop-oldest policy since startup.
    #[must_use]
    pub fn evicted_total(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Artifacts currently awaiting a handoff retry.
    #[must_use]
    pub fn pending_handoffs(&self) -> usize {
        self.pending.len()
    }

    fn create_session(&self, session_id: &str) -> CoreResult<SessionHandle> {
        let writer =
            SegmentWriter::open(self.dir.base_path(session_id), session_id, &self.config)?;
        let buffer = Arc::new(FrameBuffer::new(
            self.config.queue_capacity,
            self.config.overflow,
        ));

        let handoff = match (&self.publisher, &self.config.handoff) {
            (Some(queue), Some(config)) => Some((Arc::clone(queue), config.clone())),
            _ => None,
        };

        let join = SessionSupervisor::new(
            Arc::clone(&buffer),
            writer,
            handoff,
            Arc::clone(&self.pending),
        )
        .spawn()?;

        tracing::info!(session = %session_id, "session supervisor started");
        Ok(SessionHandle {
            buffer,
            join: Some(join),
            last_active: Instant::now(),
        })
    }

    fn retry_pending(&self) {
        let (Some(queue), Some(config)) = (&self.publisher, &self.config.handoff) else {
            return;
        };
        if self.pending.is_empty() {
            return;
        }
        let remaining = self
            .pending
            .retry(queue.as_ref(), &config.queue_name, config.ttl);
        if remaining > 0 {
            tracing::warn!(remaining, "artifacts still awaiting handoff");
        }
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("log_dir", &self.config.log_dir)
            .field("session_count", &self.session_count())
            .finish_non_exhaustive()
    }
}

fn join_supervisor(session_id: &str, mut handle: SessionHandle) {
    handle.buffer.close();
    if let Some(join) = handle.join.take() {
        if join.join().is_err() {
            // A supervisor fault is isolated to its own session
            tracing::error!(session = %session_id, "session supervisor panicked");
        }
    }
}

fn sweeper_loop(
    registry: &Weak<SessionRegistry>,
    stop: &Arc<(Mutex<bool>, Condvar)>,
    interval: Duration,
) {
    loop {
        {
            let (lock, condvar) = &**stop;
            let mut stopped = lock.lock();
            if !*stopped {
                condvar.wait_for(&mut stopped, interval);
            }
            if *stopped {
                return;
            }
        }

        let Some(registry) = registry.upgrade() else {
            return;
        };

        if !registry.config.idle_timeout.is_zero() {
            let closed = registry.close_idle(registry.config.idle_timeout);
            if closed > 0 {
                tracing::debug!(closed, "idle sessions evicted");
            }
        }
        registry.retry_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandoffConfig;
    use crate::frame::FrameRecord;
    use crate::queue::InMemoryHandoffQueue;
    use tempfile::tempdir;

    fn frame(session: &str, content: &str) -> LogFrame {
        LogFrame::new(session, 7, "alice", "user", content)
    }

    #[test]
    fn lazy_session_creation() {
        let dir = tempdir().unwrap();
        let registry = SessionRegistry::new(LogConfig::new(dir.path()), None).unwrap();
        assert_eq!(registry.session_count(), 0);

        registry.ingest(frame("s1", "a")).unwrap();
        registry.ingest(frame("s1", "b")).unwrap();
        registry.ingest(frame("s2", "c")).unwrap();
        assert_eq!(registry.session_count(), 2);
    }

    #[test]
    fn shutdown_flushes_and_refuses_further_frames() {
        let dir = tempdir().unwrap();
        let registry = SessionRegistry::new(LogConfig::new(dir.path()), None).unwrap();

        registry.ingest(frame("s1", "hello")).unwrap();
        registry.shutdown();

        let text = std::fs::read_to_string(dir.path().join("s1.tmp")).unwrap();
        assert!(text.contains("hello"));

        let result = registry.ingest(frame("s1", "late"));
        assert!(matches!(result, Err(CoreError::ShutDown)));
    }

    #[test]
    fn explicit_close_flushes_session() {
        let dir = tempdir().unwrap();
        let registry = SessionRegistry::new(LogConfig::new(dir.path()), None).unwrap();

        registry.ingest(frame("s1", "payload")).unwrap();
        registry.close("s1");
        assert_eq!(registry.session_count(), 0);

        let text = std::fs::read_to_string(dir.path().join("s1.tmp")).unwrap();
        assert!(text.contains("payload"));
    }

    #[test]
    fn session_reopens_after_close() {
        let dir = tempdir().unwrap();
        let registry = SessionRegistry::new(LogConfig::new(dir.path()), None).unwrap();

        registry.ingest(frame("s1", "first run")).unwrap();
        registry.close("s1");

        // Same id starts a fresh session; sequence numbering continues
        registry.ingest(frame("s1", "second run")).unwrap();
        registry.close("s1");

        let text = std::fs::read_to_string(dir.path().join("s1.tmp")).unwrap();
        let seqs: Vec<u64> = text
            .lines()
            .map(|l| FrameRecord::decode_line(l).unwrap().seq)
            .collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn colliding_session_ids_get_distinct_segments() {
        let dir = tempdir().unwrap();
        let registry = SessionRegistry::new(LogConfig::new(dir.path()), None).unwrap();

        // Both ids sanitize to the same file-safe name; each session must
        // still own its own segment and sequence counter
        registry.ingest(frame("a@b", "left")).unwrap();
        registry.ingest(frame("a:b", "right")).unwrap();
        assert_eq!(registry.session_count(), 2);
        registry.shutdown();

        let segments: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(segments.len(), 2, "each session owns its own segment");
        assert!(segments.iter().any(|text| text.contains("left")));
        assert!(segments.iter().any(|text| text.contains("right")));

        // Independent numbering: both streams start at 1
        for text in &segments {
            let records: Vec<FrameRecord> = text
                .lines()
                .map(|l| FrameRecord::decode_line(l).unwrap())
                .collect();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].seq, 1);
        }
    }

    #[test]
    fn session_limit_is_enforced() {
        let dir = tempdir().unwrap();
        let config = LogConfig::new(dir.path()).max_sessions(1);
        let registry = SessionRegistry::new(config, None).unwrap();

        registry.ingest(frame("s1", "ok")).unwrap();
        let result = registry.ingest(frame("s2", "refused"));
        assert!(matches!(result, Err(CoreError::SessionLimit { limit: 1 })));

        // Existing sessions keep working at the cap
        registry.ingest(frame("s1", "still ok")).unwrap();
    }

    #[test]
    fn invalid_frames_are_refused() {
        let dir = tempdir().unwrap();
        let registry = SessionRegistry::new(LogConfig::new(dir.path()), None).unwrap();

        let result = registry.ingest(frame("", "ignored"));
        assert!(matches!(result, Err(CoreError::InvalidFrame { .. })));
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn close_idle_reaps_only_idle_sessions() {
        let dir = tempdir().unwrap();
        let registry = SessionRegistry::new(LogConfig::new(dir.path()), None).unwrap();

        registry.ingest(frame("old", "x")).unwrap();
        std::thread::sleep(Duration::from_millis(150));
        registry.ingest(frame("fresh", "y")).unwrap();

        let closed = registry.close_idle(Duration::from_millis(100));
        assert_eq!(closed, 1);
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn sweeper_evicts_idle_sessions() {
        let dir = tempdir().unwrap();
        let config = LogConfig::new(dir.path()).idle_timeout(Duration::from_millis(50));
        let registry = SessionRegistry::new(config, None).unwrap();

        registry.ingest(frame("s1", "x")).unwrap();
        assert_eq!(registry.session_count(), 1);

        // The sweeper passes at the idle interval; give it a few rounds
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(registry.session_count(), 0);

        // A new frame for the same id starts a fresh session
        registry.ingest(frame("s1", "again")).unwrap();
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn rotation_publishes_through_registry() {
        let dir = tempdir().unwrap();
        let queue = Arc::new(InMemoryHandoffQueue::new());
        let config = LogConfig::new(dir.path())
            .max_segment_bytes(1)
            .compress(false)
            .handoff(HandoffConfig::new("artifacts"));
        let registry =
            SessionRegistry::new(config, Some(queue.clone() as Arc<dyn HandoffQueue>)).unwrap();

        registry.ingest(frame("s1", "rotate me")).unwrap();
        registry.shutdown();

        assert_eq!(queue.entries("artifacts").len(), 1);
        assert_eq!(registry.pending_handoffs(), 0);
    }

    #[test]
    fn failed_handoffs_retried_at_shutdown() {
        let dir = tempdir().unwrap();
        let queue = Arc::new(InMemoryHandoffQueue::new());
        queue.set_failing(true);
        let config = LogConfig::new(dir.path())
            .max_segment_bytes(1)
            .compress(false)
            .handoff(HandoffConfig::new("artifacts"));
        let registry =
            SessionRegistry::new(config, Some(queue.clone() as Arc<dyn HandoffQueue>)).unwrap();

        registry.ingest(frame("s1", "rotate me")).unwrap();

        // Let the supervisor rotate and fail its publish
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(registry.pending_handoffs(), 1);

        // The shutdown pass retries once the store is healthy again
        queue.set_failing(false);
        registry.shutdown();
        assert_eq!(queue.entries("artifacts").len(), 1);
        assert_eq!(registry.pending_handoffs(), 0);
    }
}
