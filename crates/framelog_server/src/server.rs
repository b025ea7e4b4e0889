//! Server facade.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::IngestHandler;
use crate::health::{HealthState, ServingStatus};
use framelog_core::{HandoffQueue, LogConfig, SessionRegistry};
use std::sync::Arc;

/// The ingestion server.
///
/// Owns the session registry, the stream handler, and the health signal.
/// Transport-agnostic: mount [`handler`](Self::handler) behind a
/// client-streaming RPC endpoint, or feed it from any frame source.
///
/// # Example
///
/// ```no_run
/// use framelog_core::LogConfig;
/// use framelog_server::{IngestServer, ServerConfig};
///
/// let server = IngestServer::new(
///     LogConfig::new("/var/log/framelog"),
///     ServerConfig::default(),
///     None,
/// ).unwrap();
///
/// // feed frames: server.handler().handle_stream(frames)
/// server.shutdown();
/// ```
pub struct IngestServer {
    handler: IngestHandler,
    registry: Arc<SessionRegistry>,
    health: Arc<HealthState>,
}

impl IngestServer {
    /// Starts the server: opens the registry and flips health to serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory cannot be locked or the
    /// pending-handoff index cannot be read. This is the only fatal
    /// condition in the pipeline; everything past startup degrades
    /// per-frame or per-rotation instead.
    pub fn new(
        log_config: LogConfig,
        server_config: ServerConfig,
        publisher: Option<Arc<dyn HandoffQueue>>,
    ) -> ServerResult<Self> {
        let registry = SessionRegistry::new(log_config, publisher)?;
        let handler = IngestHandler::new(Arc::clone(&registry), server_config);

        let health = Arc::new(HealthState::new());
        health.set(ServingStatus::Serving);

        tracing::info!("ingestion server serving");
        Ok(Self {
            handler,
            registry,
            health,
        })
    }

    /// Returns the stream handler.
    #[must_use]
    pub fn handler(&self) -> &IngestHandler {
        &self.handler
    }

    /// Returns the health signal, shareable with a health endpoint.
    #[must_use]
    pub fn health(&self) -> Arc<HealthState> {
        Arc::clone(&self.health)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.registry.session_count()
    }

    /// Total frames evicted under backpressure since startup.
    #[must_use]
    pub fn evicted_total(&self) -> u64 {
        self.registry.evicted_total()
    }

    /// Gracefully shuts down: health goes not-serving first, then every
    /// session is drained, flushed, and closed.
    pub fn shutdown(&self) {
        self.health.set(ServingStatus::NotServing);
        tracing::info!("ingestion server draining for shutdown");
        self.registry.shutdown();
    }
}

impl std::fmt::Debug for IngestServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestServer")
            .field("serving", &self.health.status())
            .field("session_count", &self.session_count())
            .finish_non_exhaustive()
    }
}
