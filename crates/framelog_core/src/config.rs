//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Overflow policy for a session's bounded frame buffer.
///
/// `DropOldest` is the default: under sustained overload the most recent
/// frames are retained at the cost of silently losing older ones, ingestion
/// never blocks the producer, and memory never grows unboundedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the single oldest queued frame to admit the new one.
    #[default]
    DropOldest,
    /// Reject the incoming frame, keeping what is already queued.
    DropNewest,
    /// Block the producer until space is available.
    Block,
}

/// Handoff queue settings.
#[derive(Debug, Clone)]
pub struct HandoffConfig {
    /// Name of the queue key artifacts are pushed onto.
    pub queue_name: String,
    /// Time-to-live refreshed on the queue key after each push.
    /// Zero means no expiry.
    pub ttl: Duration,
}

impl HandoffConfig {
    /// Creates a handoff configuration with no key expiry.
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ttl: Duration::ZERO,
        }
    }

    /// Sets the queue key time-to-live.
    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Configuration for the append-log engine.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory holding segments, side-files, and finalized artifacts.
    pub log_dir: PathBuf,

    /// Cumulative content bytes before a segment rotates.
    pub max_segment_bytes: u64,

    /// Whether rotated segments are compressed.
    pub compress: bool,

    /// zstd compression level used when `compress` is set.
    pub compression_level: i32,

    /// Whether to fsync the segment during rotation (durability vs latency).
    pub sync_on_rotate: bool,

    /// Capacity of each session's bounded frame buffer.
    pub queue_capacity: usize,

    /// What to do when a session's buffer is full.
    pub overflow: OverflowPolicy,

    /// Sessions idle longer than this are flushed and closed.
    /// Zero disables idle eviction.
    pub idle_timeout: Duration,

    /// Maximum number of live sessions; frames for new sessions beyond the
    /// cap are refused.
    pub max_sessions: usize,

    /// Handoff queue settings; `None` disables handoff entirely.
    pub handoff: Option<HandoffConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("framelog"),
            max_segment_bytes: 4 * 1024 * 1024, // 4 MB of content
            compress: true,
            compression_level: 3,
            sync_on_rotate: false,
            queue_capacity: 1024,
            overflow: OverflowPolicy::DropOldest,
            idle_timeout: Duration::ZERO, // disabled
            max_sessions: 4096,
            handoff: None,
        }
    }
}

impl LogConfig {
    /// Creates a configuration rooted at the given log directory.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the rotation threshold in content bytes.
    #[must_use]
    pub const fn max_segment_bytes(mut self, bytes: u64) -> Self {
        self.max_segment_bytes = bytes;
        self
    }

    /// Enables or disables artifact compression.
    #[must_use]
    pub const fn compress(mut self, value: bool) -> Self {
        self.compress = value;
        self
    }

    /// Sets the zstd compression level.
    #[must_use]
    pub const fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Enables or disables fsync during rotation.
    #[must_use]
    pub const fn sync_on_rotate(mut self, value: bool) -> Self {
        self.sync_on_rotate = value;
        self
    }

    /// Sets the per-session buffer capacity.
    #[must_use]
    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the buffer overflow policy.
    #[must_use]
    pub const fn overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    /// Sets the idle-session timeout (zero disables eviction).
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the live-session cap.
    #[must_use]
    pub const fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Sets the handoff queue configuration.
    #[must_use]
    pub fn handoff(mut self, handoff: HandoffConfig) -> Self {
        self.handoff = Some(handoff);
        self
    }
}
