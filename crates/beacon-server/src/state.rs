//! Shared state for the webhook server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use beacon_alerts::{AlertPipeline, DestinationRegistry, PrometheusMetrics};
use tokio_util::sync::CancellationToken;

/// Shared state handed to every request handler.
#[derive(Debug)]
pub struct AppState {
    pipeline: AlertPipeline,
    registry: Arc<DestinationRegistry>,
    metrics: Arc<PrometheusMetrics>,
    /// Cancelled when in-flight sends must stop.
    shutdown: CancellationToken,
    ready: AtomicBool,
    start_time: Instant,
}

impl AppState {
    /// Creates the state. The server starts out not ready.
    #[must_use]
    pub fn new(
        pipeline: AlertPipeline,
        registry: Arc<DestinationRegistry>,
        metrics: Arc<PrometheusMetrics>,
    ) -> Self {
        Self {
            pipeline,
            registry,
            metrics,
            shutdown: CancellationToken::new(),
            ready: AtomicBool::new(false),
            start_time: Instant::now(),
        }
    }

    /// Returns the alert pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &AlertPipeline {
        &self.pipeline
    }

    /// Returns the destination registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<DestinationRegistry> {
        &self.registry
    }

    /// Returns the metrics registry.
    #[must_use]
    pub const fn metrics(&self) -> &Arc<PrometheusMetrics> {
        &self.metrics
    }

    /// Returns the token that aborts in-flight destination sends.
    #[must_use]
    pub const fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Marks the server as accepting traffic, or not.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Returns true once the server accepts traffic and until shutdown begins.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && !self.shutdown.is_cancelled()
    }

    /// Returns the number of configured teams.
    #[must_use]
    pub fn team_count(&self) -> usize {
        self.pipeline.resolver().teams().len()
    }

    /// Returns the server uptime in seconds.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
