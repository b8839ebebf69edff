//! HTTP front end for Beacon.
//!
//! `beacon-server` receives Alertmanager webhooks on `POST /api/alerts`, runs
//! them through the [`beacon_alerts::AlertPipeline`] and exposes health and
//! Prometheus endpoints.
//!
//! # Endpoints
//!
//! - `POST /api/alerts` - Alertmanager webhook receiver
//! - `GET /livez` - liveness
//! - `GET /healthz`, `GET /readyz` - readiness with destination and team counts
//! - `GET /metrics` - Prometheus text exposition

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod startup;
pub mod state;
pub mod telemetry;

pub use config::{LogFormat, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use routes::create_router;
pub use server::BeaconServer;
pub use startup::build_state;
pub use state::AppState;
