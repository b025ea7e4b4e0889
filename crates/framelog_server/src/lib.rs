//! # FrameLog Server
//!
//! Ingestion frontend for FrameLog.
//!
//! This crate provides:
//! - A stream handler accepting sequences of log frames
//! - Per-call acknowledgments (frames accepted, terminal status)
//! - A liveness/health signal for serving state
//!
//! # Architecture
//!
//! The server is transport-agnostic: it validates frames at the protocol
//! boundary and routes them into the [`framelog_core`] session registry. In
//! a real deployment you would expose a client-streaming RPC endpoint that
//! feeds `handler().handle_stream(...)`; the `framelog` CLI mounts the same
//! handler on stdin.
//!
//! # Acknowledgments
//!
//! The ack returned at end of stream counts frames *accepted into the
//! pipeline*, not frames durably written or handed off. Durability beyond
//! acceptance is a background, eventually-consistent property.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code must not panic - error paths return Result
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod health;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{IngestAck, IngestHandler, IngestStatus};
pub use health::{HealthState, ServingStatus};
pub use server::IngestServer;
