//! Bounded per-session frame buffer.

use crate::config::OverflowPolicy;
use crate::frame::LogFrame;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// Outcome of pushing a frame into a [`FrameBuffer`].
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The frame was enqueued.
    Enqueued,
    /// The buffer was full; the returned oldest frame was evicted to admit
    /// the new one.
    Evicted(LogFrame),
    /// The buffer was full and the incoming frame was rejected.
    Rejected,
    /// The buffer is closed; the frame was not accepted.
    Closed,
}

/// Outcome of popping from a [`FrameBuffer`].
#[derive(Debug, PartialEq, Eq)]
pub enum Popped {
    /// The next frame in FIFO order.
    Frame(LogFrame),
    /// No frame arrived within the wait window.
    TimedOut,
    /// The buffer is closed and fully drained.
    Closed,
}

#[derive(Debug, Default)]
struct Inner {
    frames: VecDeque<LogFrame>,
    closed: bool,
}

/// A bounded FIFO of frames between the router and one session supervisor.
///
/// The buffer has a fixed capacity and a configurable [`OverflowPolicy`].
/// Under the default drop-oldest policy a push never blocks and memory never
/// grows past the capacity; instead the single oldest queued-but-unwritten
/// frame is evicted to admit the new one.
///
/// A closed buffer stops accepting pushes but keeps handing out already
/// queued frames until drained, after which pops report [`Popped::Closed`].
#[derive(Debug)]
pub struct FrameBuffer {
    inner: Mutex<Inner>,
    /// Signaled when a frame arrives or the buffer closes.
    available: Condvar,
    /// Signaled when space frees up (for the blocking policy).
    space: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
}

impl FrameBuffer {
    /// Creates a buffer with the given capacity and overflow policy.
    ///
    /// A zero capacity is bumped to one so the buffer can always make
    /// progress.
    #[must_use]
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            available: Condvar::new(),
            space: Condvar::new(),
            capacity: capacity.max(1),
            policy,
        }
    }

    /// Pushes a frame, applying the overflow policy when full.
    pub fn push(&self, frame: LogFrame) -> PushOutcome {
        let mut inner = self.inner.lock();
        if inner.closed {
            return PushOutcome::Closed;
        }

        if inner.frames.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropOldest => {
                    let evicted = inner.frames.pop_front();
                    inner.frames.push_back(frame);
                    self.available.notify_one();
                    return match evicted {
                        Some(old) => PushOutcome::Evicted(old),
                        None => PushOutcome::Enqueued,
                    };
                }
                OverflowPolicy::DropNewest => return PushOutcome::Rejected,
                OverflowPolicy::Block => {
                    while inner.frames.len() >= self.capacity && !inner.closed {
                        self.space.wait(&mut inner);
                    }
                    if inner.closed {
                        return PushOutcome::Closed;
                    }
                }
            }
        }

        inner.frames.push_back(frame);
        self.available.notify_one();
        PushOutcome::Enqueued
    }

    /// Pops the next frame in FIFO order, waiting up to `timeout`.
    ///
    /// The timeout exists so the consumer periodically observes close and
    /// idle signals; it carries no ordering meaning.
    pub fn pop(&self, timeout: Duration) -> Popped {
        let mut inner = self.inner.lock();
        loop {
            if let Some(frame) = inner.frames.pop_front() {
                self.space.notify_one();
                return Popped::Frame(frame);
            }
            if inner.closed {
                return Popped::Closed;
            }
            if self.available.wait_for(&mut inner, timeout).timed_out() {
                return match inner.frames.pop_front() {
                    Some(frame) => {
                        self.space.notify_one();
                        Popped::Frame(frame)
                    }
                    None if inner.closed => Popped::Closed,
                    None => Popped::TimedOut,
                };
            }
        }
    }

    /// Closes the buffer: no further pushes are accepted, queued frames
    /// remain poppable, and all waiters wake.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.available.notify_all();
        self.space.notify_all();
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of queued frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Returns true if no frames are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
