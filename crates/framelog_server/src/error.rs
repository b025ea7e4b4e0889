//! Error types for the ingestion frontend.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the ingestion frontend.
#[derive(Debug, Error)]
pub enum ServerError {
    /// An engine-level failure.
    #[error("engine error: {0}")]
    Core(#[from] framelog_core::CoreError),

    /// A frame violated the inbound protocol.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },
}

impl ServerError {
    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}
