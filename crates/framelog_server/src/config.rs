//! Server configuration.

/// Configuration for the ingestion frontend.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum accepted frame content size in bytes; larger frames are
    /// rejected at the protocol boundary. Zero disables the cap.
    pub max_content_bytes: usize,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum frame content size (zero disables the cap).
    #[must_use]
    pub const fn with_max_content_bytes(mut self, bytes: usize) -> Self {
        self.max_content_bytes = bytes;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_content_bytes: 1024 * 1024, // 1 MiB
        }
    }
}
