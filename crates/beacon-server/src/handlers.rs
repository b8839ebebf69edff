//! HTTP request handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use beacon_alerts::{PrometheusMetrics, RawAlertEvent};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Body returned when an event was processed.
#[derive(Debug, Serialize)]
pub struct AlertAccepted {
    /// Always `alert processed`.
    pub status: &'static str,
}

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct LiveResponse {
    /// Status message.
    pub status: &'static str,
}

/// Health and readiness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `unavailable`.
    pub status: &'static str,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Registered destinations.
    pub destinations: usize,
    /// Configured teams.
    pub teams: usize,
}

/// Handle POST /api/alerts - receive an Alertmanager webhook.
pub async fn receive_alerts(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ServerResult<Json<AlertAccepted>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ServerError::EmptyBody);
    }

    let raw: RawAlertEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "failed to decode alert payload");
        ServerError::InvalidFormat(e)
    })?;
    debug!(receiver = %raw.receiver, alerts = raw.alerts.len(), "alert payload received");

    let cancel = state.shutdown_token().child_token();
    state.pipeline().process(&cancel, raw).await?;

    Ok(Json(AlertAccepted {
        status: "alert processed",
    }))
}

/// Handle GET /livez - the process is up.
pub async fn livez() -> Json<LiveResponse> {
    Json(LiveResponse { status: "ok" })
}

/// Handle GET /healthz and GET /readyz - the server accepts traffic.
pub async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ready = state.is_ready();
    let body = HealthResponse {
        status: if ready { "ok" } else { "unavailable" },
        uptime_secs: state.uptime_secs(),
        destinations: state.registry().len(),
        teams: state.team_count(),
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// Handle GET /metrics - Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PrometheusMetrics::content_type())],
        state.metrics().encode(),
    )
}
