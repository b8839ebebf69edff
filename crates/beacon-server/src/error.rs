//! Error types for the webhook server.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use beacon_alerts::{ConfigError, PipelineError};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request carried no body.
    #[error("empty JSON body")]
    EmptyBody,

    /// The request body is not a webhook payload.
    #[error("invalid alert format")]
    InvalidFormat(#[source] serde_json::Error),

    /// The pipeline rejected or failed to process the event.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A configuration file could not be loaded.
    #[error("config file '{}': {reason}", .path.display())]
    Config {
        /// The offending file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A `${VAR}` placeholder refers to an unset environment variable.
    #[error("missing required env {var} for {kind} destination {destination}")]
    MissingEnv {
        /// Variable name.
        var: String,
        /// Destination kind.
        kind: &'static str,
        /// Destination name.
        destination: String,
    },

    /// Destination or team configuration is inconsistent.
    #[error(transparent)]
    Alerts(#[from] ConfigError),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::EmptyBody => (StatusCode::BAD_REQUEST, "empty_body"),
            Self::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "invalid_format"),
            Self::Pipeline(PipelineError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_alert")
            }
            Self::Pipeline(PipelineError::Conversion(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "conversion_failed")
            }
            Self::Pipeline(PipelineError::Dispatch(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dispatch_failed")
            }
            Self::Config { .. }
            | Self::MissingEnv { .. }
            | Self::Alerts(_)
            | Self::BindFailed(_, _)
            | Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Pipeline(PipelineError::Validation(e)) => format!("invalid alert format: {e}"),
            Self::Pipeline(PipelineError::Conversion(e)) => format!("failed to convert alert: {e}"),
            Self::Pipeline(PipelineError::Dispatch(e)) => format!("failed to dispatch issues: {e}"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();
        let body = ErrorResponse {
            error,
            message: self.client_message(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":"internal_error","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}
