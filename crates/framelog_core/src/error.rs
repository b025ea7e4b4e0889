//! Error types for FrameLog core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in FrameLog core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] framelog_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record serialization error.
    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// An inbound frame failed validation.
    #[error("invalid frame: {message}")]
    InvalidFrame {
        /// Description of the validation failure.
        message: String,
    },

    /// The registry is at its live-session cap.
    #[error("session limit reached: {limit} live sessions")]
    SessionLimit {
        /// The configured cap.
        limit: usize,
    },

    /// The registry has been shut down.
    #[error("registry is shut down")]
    ShutDown,

    /// The log directory is locked by another process.
    #[error("log directory locked: another process has exclusive access")]
    DirectoryLocked,

    /// The sequence side-file is unreadable or malformed.
    #[error("sequence file corrupt: {message}")]
    SequenceCorrupt {
        /// Description of the corruption.
        message: String,
    },

    /// A handoff queue publish failed.
    #[error("handoff failed: {message}")]
    Handoff {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid frame error.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Creates a sequence corruption error.
    pub fn sequence_corrupt(message: impl Into<String>) -> Self {
        Self::SequenceCorrupt {
            message: message.into(),
        }
    }

    /// Creates a handoff error.
    pub fn handoff(message: impl Into<String>) -> Self {
        Self::Handoff {
            message: message.into(),
        }
    }
}
