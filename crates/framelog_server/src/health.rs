//! Liveness/health signal.

use std::sync::atomic::{AtomicBool, Ordering};

/// Overall serving state, as reported to health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingStatus {
    /// The service accepts frames.
    Serving,
    /// The service is starting up or shutting down.
    NotServing,
}

/// A process-wide serving flag.
///
/// Toggled to `Serving` at process start and to `NotServing` during
/// graceful shutdown, before sessions are drained, so load balancers stop
/// routing new streams while the drain completes.
#[derive(Debug, Default)]
pub struct HealthState {
    serving: AtomicBool,
}

impl HealthState {
    /// Creates a health state reporting `NotServing`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports the current serving status.
    #[must_use]
    pub fn status(&self) -> ServingStatus {
        if self.serving.load(Ordering::SeqCst) {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        }
    }

    /// Sets the serving status.
    pub fn set(&self, status: ServingStatus) {
        self.serving
            .store(status == ServingStatus::Serving, Ordering::SeqCst);
    }
}
