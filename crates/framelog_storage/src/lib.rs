//! # FrameLog Storage
//!
//! Append-only segment backend trait and implementations for FrameLog.
//!
//! This crate provides the lowest-level storage abstraction for FrameLog.
//! Segment backends are **opaque byte sinks** - they do not interpret the
//! records appended to them.
//!
//! ## Design Principles
//!
//! - Backends are simple append sinks (append, flush, sync)
//! - No knowledge of FrameLog record formats, sessions, or rotation
//! - Must be `Send` so a session supervisor can own one on its own thread
//! - FrameLog core owns all record format interpretation
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - For testing, with write-failure injection
//! - [`FileBackend`] - For persistent storage using buffered OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use framelog_storage::{SegmentBackend, MemoryBackend};
//!
//! let mut backend = MemoryBackend::new();
//! backend.append(b"hello world\n").unwrap();
//! assert_eq!(backend.len().unwrap(), 12);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::SegmentBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
