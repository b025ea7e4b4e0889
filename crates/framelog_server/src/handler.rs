//! Inbound stream handling.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use framelog_core::{IngestOutcome, LogFrame, SessionRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Terminal status of an ingestion stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestStatus {
    /// The stream was read to its end and accepted frames are in the
    /// pipeline.
    Acknowledged,
}

/// Acknowledgment returned when an ingestion stream ends.
///
/// `frames_received` counts frames accepted into the pipeline during the
/// call - not frames durably written or handed off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestAck {
    /// Frames accepted during the stream.
    pub frames_received: u32,
    /// Terminal status.
    pub status: IngestStatus,
}

/// Validates inbound frames and routes them into the session registry.
pub struct IngestHandler {
    registry: Arc<SessionRegistry>,
    config: ServerConfig,
}

impl IngestHandler {
    /// Creates a handler over a registry.
    pub fn new(registry: Arc<SessionRegistry>, config: ServerConfig) -> Self {
        Self { registry, config }
    }

    /// Handles one inbound frame.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the frame's content exceeds the
    /// configured cap, or an engine error if routing fails. Neither
    /// terminates the surrounding stream.
    pub fn handle_frame(&self, frame: LogFrame) -> ServerResult<IngestOutcome> {
        if self.config.max_content_bytes > 0 && frame.content.len() > self.config.max_content_bytes
        {
            return Err(ServerError::protocol(format!(
                "frame content of {} bytes exceeds cap of {}",
                frame.content.len(),
                self.config.max_content_bytes
            )));
        }
        Ok(self.registry.ingest(frame)?)
    }

    /// Handles a whole inbound stream, frame by frame.
    ///
    /// Malformed or refused frames are logged and skipped; they never
    /// terminate the stream for the frames that follow. Returns the
    /// end-of-stream acknowledgment.
    pub fn handle_stream<I>(&self, frames: I) -> IngestAck
    where
        I: IntoIterator<Item = LogFrame>,
    {
        let mut accepted: u32 = 0;
        for frame in frames {
            let session = frame.session_id.clone();
            match self.handle_frame(frame) {
                Ok(IngestOutcome::Enqueued | IngestOutcome::EvictedOldest) => {
                    accepted = accepted.saturating_add(1);
                }
                Ok(IngestOutcome::Rejected) => {
                    tracing::warn!(session = %session, "frame refused by overflow policy");
                }
                Err(e) => {
                    tracing::warn!(error = %e, session = %session, "frame rejected");
                }
            }
        }

        IngestAck {
            frames_received: accepted,
            status: IngestStatus::Acknowledged,
        }
    }
}

impl std::fmt::Debug for IngestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
