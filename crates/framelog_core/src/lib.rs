//! # FrameLog Core
//!
//! Session-partitioned append-log engine.
//!
//! This crate accepts streams of small structured log frames from many
//! concurrent producers (one stream per logical session), durably appends
//! them to disk in arrival order, rotates and compresses completed segments,
//! and hands the compressed artifacts off to an external durable queue.
//!
//! # Architecture
//!
//! ```text
//! producer ──> SessionRegistry ──> FrameBuffer (bounded, per session)
//!                                       │
//!                              SessionSupervisor (one thread per session)
//!                                       │
//!                                 SegmentWriter ──[threshold]──> rotate
//!                                       │                          │
//!                                       └── append <base>.tmp      ├─ zstd compress
//!                                                                  ├─ HandoffQueue publish
//!                                                                  └─ fresh segment
//! ```
//!
//! Each session's state (queue, file handle, sequence counter) is exclusively
//! owned and mutated only by that session's supervisor thread; sessions never
//! contend on shared state. Ordering is strict FIFO within a session; no
//! ordering guarantee exists across sessions.
//!
//! # Backpressure
//!
//! Per-session buffers are bounded. Under sustained overload the default
//! policy evicts the single oldest queued-but-unwritten frame to admit the
//! new one: the most recent frames are retained at the cost of silently
//! losing older ones, ingestion never blocks the producer, and memory never
//! grows unboundedly. See [`OverflowPolicy`] for the alternatives.
//!
//! # Durability
//!
//! Acceptance is not durability: producers are acknowledged when a frame is
//! accepted into the pipeline. Frames become durable when the segment is
//! flushed (and optionally fsynced) at rotation, and the handoff to the
//! external queue is best-effort at-least-once - artifacts whose push fails
//! remain on disk and are recorded in a pending index for retry.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code must not panic - error paths return Result
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod buffer;
mod compress;
mod config;
mod dir;
mod error;
mod frame;
mod pending;
mod queue;
mod registry;
mod supervisor;
mod writer;

pub use buffer::{FrameBuffer, Popped, PushOutcome};
pub use compress::compress_artifact;
pub use config::{HandoffConfig, LogConfig, OverflowPolicy};
pub use dir::LogDir;
pub use error::{CoreError, CoreResult};
pub use frame::{FrameRecord, LogFrame};
pub use pending::PendingIndex;
pub use queue::{HandoffQueue, InMemoryHandoffQueue, RespHandoffQueue};
pub use registry::{IngestOutcome, SessionRegistry};
pub use supervisor::SessionSupervisor;
pub use writer::SegmentWriter;
