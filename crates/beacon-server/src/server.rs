//! Webhook server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::{ServerError, ServerResult};
use crate::routes::create_router;
use crate::state::AppState;

/// HTTP server that feeds webhook events into the alert pipeline.
#[derive(Debug, Clone)]
pub struct BeaconServer {
    state: Arc<AppState>,
}

impl BeaconServer {
    /// Creates a server over the given state.
    #[must_use]
    pub const fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Returns the shared state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Creates the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    /// Binds `addr` and serves until `shutdown` completes.
    ///
    /// Once `shutdown` completes the server stops accepting connections and
    /// reports not ready. In-flight requests get `grace` to finish; after that
    /// their destination sends are cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the server stops abnormally.
    pub async fn serve_with_shutdown<F>(
        &self,
        addr: SocketAddr,
        grace: Duration,
        shutdown: F,
    ) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        info!(addr = %local_addr, "beacon listening");
        self.state.set_ready(true);

        let state = self.state.clone();
        let signal = async move {
            shutdown.await;
            info!(grace_secs = grace.as_secs(), "shutting down");
            state.set_ready(false);

            let token = state.shutdown_token().clone();
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                if !token.is_cancelled() {
                    warn!("shutdown grace period elapsed, cancelling in-flight sends");
                    token.cancel();
                }
            });
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        self.state.shutdown_token().cancel();
        info!("beacon shut down");
        Ok(())
    }
}
