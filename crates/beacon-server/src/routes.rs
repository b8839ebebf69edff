//! Route configuration.

use std::sync::Arc;

use axum::routing::{get, post, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{livez, metrics, readyz, receive_alerts};
use crate::state::AppState;

/// Create the webhook server router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new().route("/alerts", post(receive_alerts));

    Router::new()
        .nest("/api", api_routes)
        .route("/livez", get(livez))
        .route("/healthz", get(readyz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
