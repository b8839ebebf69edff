//! Error types for the beacon-alerts crate.
//!
//! Each stage of the pipeline owns its error type so callers can tell a
//! rejected payload apart from a failed delivery or a broken configuration.

use std::fmt::Write as _;

use thiserror::Error;

/// An inbound event failed validation. Terminal for the whole event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The event has no receiver.
    #[error("missing receiver field")]
    MissingReceiver,

    /// The event has no overall status.
    #[error("missing status field")]
    MissingStatus,

    /// The event carries no alerts.
    #[error("missing alerts")]
    MissingAlerts,

    /// An alert status is empty or not one of `firing`/`resolved`.
    #[error("alert at index {index}: invalid status value: {status:?}")]
    InvalidAlertStatus {
        /// Position of the offending alert.
        index: usize,
        /// The rejected status value.
        status: String,
    },

    /// An alert has no `alertname` label.
    #[error("alert at index {index}: missing alertname label")]
    MissingAlertName {
        /// Position of the offending alert.
        index: usize,
    },

    /// A firing alert has no start time.
    #[error("alert at index {index}: missing start time for firing alert")]
    MissingStartTime {
        /// Position of the offending alert.
        index: usize,
    },
}

impl ValidationError {
    /// Returns the index of the offending alert, if the error concerns one.
    #[must_use]
    pub const fn alert_index(&self) -> Option<usize> {
        match self {
            Self::InvalidAlertStatus { index, .. }
            | Self::MissingAlertName { index }
            | Self::MissingStartTime { index } => Some(*index),
            Self::MissingReceiver | Self::MissingStatus | Self::MissingAlerts => None,
        }
    }
}

/// Converting an event into issues failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// No event was supplied.
    #[error("nil alertmanager event")]
    NilEvent,

    /// The event carries no alerts.
    #[error("no alerts in alertmanager event")]
    NoAlerts,

    /// A single alert could not be converted. Logged and skipped by the batch.
    #[error("alert at index {index}: missing alertname label")]
    MissingAlertName {
        /// Position of the skipped alert.
        index: usize,
    },

    /// Every alert in the batch was skipped.
    #[error("no issues created from alertmanager event ({skipped} alerts skipped)")]
    NoIssuesProduced {
        /// Number of alerts that failed to convert.
        skipped: usize,
    },
}

/// Attaching label or annotation enrichments to an issue failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    /// A block could not be rendered in its display format.
    #[error("failed to render {section} enrichment: {reason}")]
    Render {
        /// The section being rendered (`labels` or `annotations`).
        section: &'static str,
        /// The underlying failure.
        reason: String,
    },
}

/// A destination or team declaration is invalid. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required field is empty.
    #[error("{kind} destination '{destination}' must have {field}")]
    MissingField {
        /// Destination kind, e.g. `slack`.
        kind: &'static str,
        /// Destination name as declared.
        destination: String,
        /// The missing field.
        field: &'static str,
    },

    /// A field holds a value outside its allowed range.
    #[error("{kind} destination '{destination}': invalid {field}: {reason}")]
    InvalidField {
        /// Destination kind, e.g. `slack`.
        kind: &'static str,
        /// Destination name as declared.
        destination: String,
        /// The invalid field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The configuration declares a destination kind this build cannot construct.
    #[error("unsupported destination type: {kind}")]
    UnsupportedDestinationType {
        /// The declared kind.
        kind: String,
    },

    /// Two destinations are declared with the same name.
    #[error("duplicate destination name '{name}'")]
    DuplicateDestination {
        /// The repeated name.
        name: String,
    },

    /// A team references a destination that is not registered.
    #[error("team '{team}' references non-existent destination '{destination}'")]
    UnknownTeamDestination {
        /// The team name.
        team: String,
        /// The missing destination name.
        destination: String,
    },

    /// A destination could not be built while loading the registry.
    #[error("failed to create {kind} destination '{name}': {source}")]
    DestinationCreation {
        /// Destination kind, e.g. `slack`.
        kind: &'static str,
        /// Destination name as declared.
        name: String,
        /// The factory failure.
        #[source]
        source: Box<ConfigError>,
    },
}

/// Looking up destinations by name failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No destination is registered under this name.
    #[error("destination '{name}' not found")]
    NotFound {
        /// The requested name.
        name: String,
    },
}

/// A single destination failed to deliver a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    /// The outbound request could not be completed.
    #[error("request failed: {reason}")]
    Http {
        /// Transport-level failure.
        reason: String,
    },

    /// The endpoint answered with a non-success status.
    #[error("unexpected response status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The endpoint accepted the request but reported an API error.
    #[error("api error: {reason}")]
    Api {
        /// Error code returned by the API.
        reason: String,
    },

    /// The operation was cancelled before the send completed.
    #[error("send cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for DestinationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http {
            reason: err.to_string(),
        }
    }
}

/// The outcome of one failed send within a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{destination}: {error}")]
pub struct DeliveryFailure {
    /// Destination name.
    pub destination: String,
    /// Why the send failed.
    pub error: DestinationError,
}

/// Dispatching a notification to a team's destinations failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The team's destinations could not be resolved; nothing was sent.
    #[error("failed to resolve destinations for team '{team}': {source}")]
    Lookup {
        /// The team being dispatched to.
        team: String,
        /// The registry failure.
        #[source]
        source: RegistryError,
    },

    /// One or more destinations failed. Sends that succeeded are not rolled back.
    #[error(
        "failed to send to {} destinations: {}",
        failure_ratio(.failures, .delivered),
        join_failures(.failures)
    )]
    Delivery {
        /// Every failed destination with its error, in send order.
        failures: Vec<DeliveryFailure>,
        /// Destinations that accepted the notification, in send order.
        delivered: Vec<String>,
    },
}

fn failure_ratio(failures: &[DeliveryFailure], delivered: &[String]) -> String {
    format!("{} of {}", failures.len(), failures.len() + delivered.len())
}

fn join_failures(failures: &[DeliveryFailure]) -> String {
    let mut joined = String::new();
    for (i, failure) in failures.iter().enumerate() {
        if i > 0 {
            joined.push_str("; ");
        }
        let _ = write!(joined, "{failure}");
    }
    joined
}

/// Any failure surfaced by [`crate::AlertPipeline::process`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The inbound event was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No issue could be produced from the event.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Delivery to the resolved team failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl PipelineError {
    /// Returns true if the caller sent a bad payload, as opposed to a server-side failure.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Short machine-readable reason, used as a metric label.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Conversion(_) => "conversion_failed",
            Self::Dispatch(_) => "dispatch_failed",
        }
    }
}
