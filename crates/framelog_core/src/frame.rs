//! Log frame envelope and on-disk record format.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// A single log frame as submitted by a producer.
///
/// Frames are opaque to the engine beyond this envelope: `actor`, `role`,
/// and `content` pass through unchanged, and only `content.len()` feeds
/// rotation accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFrame {
    /// Groups frames into one ordered stream; producer-assigned, stable.
    pub session_id: String,

    /// Producer-supplied ordinal; 0 means "assign the next one for me".
    #[serde(default)]
    pub sequence: u64,

    /// Event time in nanoseconds since the Unix epoch, producer-supplied.
    pub time: i64,

    /// Opaque classification field, passed through unchanged.
    #[serde(default)]
    pub actor: String,

    /// Opaque classification field, passed through unchanged.
    #[serde(default)]
    pub role: String,

    /// Opaque payload; its length drives rotation accounting.
    #[serde(default)]
    pub content: String,
}

impl LogFrame {
    /// Creates a frame with an engine-assigned sequence.
    pub fn new(
        session_id: impl Into<String>,
        time: i64,
        actor: impl Into<String>,
        role: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            sequence: 0,
            time,
            actor: actor.into(),
            role: role.into(),
            content: content.into(),
        }
    }

    /// Validates the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFrame`] if the session id is empty or
    /// contains path separators.
    pub fn validate(&self) -> CoreResult<()> {
        if self.session_id.is_empty() {
            return Err(CoreError::invalid_frame("empty session_id"));
        }
        if self.session_id.contains(['/', '\\']) {
            return Err(CoreError::invalid_frame(
                "session_id must not contain path separators",
            ));
        }
        Ok(())
    }
}

/// The line-delimited on-disk record for one frame.
///
/// Serialized as one JSON object per line:
/// `{"time": <i64 nanos>, "seq": <u64>, "user": ..., "role": ..., "content": ...}`.
/// The `user` field name is the wire contract for the frame's `actor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Event time in nanoseconds since the Unix epoch.
    pub time: i64,
    /// Assigned sequence number.
    pub seq: u64,
    /// The frame's actor, under its wire name.
    #[serde(rename = "user")]
    pub actor: String,
    /// The frame's role, passed through.
    pub role: String,
    /// The frame's payload, passed through.
    pub content: String,
}

impl FrameRecord {
    /// Builds a record from a frame and its assigned sequence.
    #[must_use]
    pub fn from_frame(frame: &LogFrame, seq: u64) -> Self {
        Self {
            time: frame.time,
            seq,
            actor: frame.actor.clone(),
            role: frame.role.clone(),
            content: frame.content.clone(),
        }
    }

    /// Serializes the record as one newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_line(&self) -> CoreResult<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Parses a record from one JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a valid record.
    pub fn decode_line(line: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(line)?)
    }
}
