//! Handoff queue abstraction.
//!
//! Finalized artifacts are handed off by pushing their paths onto a named
//! queue in an external durable store. The trait abstracts that store so
//! tests and embedders can supply their own implementation.

mod resp;

pub use resp::RespHandoffQueue;

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A durable external queue that receives finalized artifact paths.
///
/// `publish` is idempotent at the level of "push a reference": duplicate
/// pushes for the same artifact (after a retried rotation or a pending-index
/// retry) are acceptable because downstream consumers are expected to be
/// idempotent with respect to artifact paths.
///
/// Implementations must never panic on transient connectivity failure; they
/// return the error for the caller to log.
pub trait HandoffQueue: Send + Sync {
    /// Pushes an artifact path onto the named queue.
    ///
    /// When `ttl` is positive the queue key's time-to-live is refreshed, so
    /// the key's expiry reflects the most recent activity, not the first.
    ///
    /// # Errors
    ///
    /// Returns an error if the push cannot be completed.
    fn publish(&self, queue_name: &str, artifact: &str, ttl: Duration) -> CoreResult<()>;
}

/// An in-memory handoff queue for tests and embedders.
///
/// Records every push in order (duplicates included) and remembers the last
/// TTL refreshed per queue. Failures can be injected to exercise the
/// best-effort handoff path.
#[derive(Debug, Default)]
pub struct InMemoryHandoffQueue {
    queues: Mutex<HashMap<String, Vec<String>>>,
    ttls: Mutex<HashMap<String, Duration>>,
    fail: AtomicBool,
}

impl InMemoryHandoffQueue {
    /// Creates an empty queue store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pushed entries for a queue, in push order.
    #[must_use]
    pub fn entries(&self, queue_name: &str) -> Vec<String> {
        self.queues
            .lock()
            .get(queue_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the most recently refreshed TTL for a queue, if any.
    #[must_use]
    pub fn ttl_of(&self, queue_name: &str) -> Option<Duration> {
        self.ttls.lock().get(queue_name).copied()
    }

    /// Makes subsequent publishes fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

impl HandoffQueue for InMemoryHandoffQueue {
    fn publish(&self, queue_name: &str, artifact: &str, ttl: Duration) -> CoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::handoff("injected publish failure"));
        }

        self.queues
            .lock()
            .entry(queue_name.to_string())
            .or_default()
            .push(artifact.to_string());

        if !ttl.is_zero() {
            self.ttls.lock().insert(queue_name.to_string(), ttl);
        }
        Ok(())
    }
}
