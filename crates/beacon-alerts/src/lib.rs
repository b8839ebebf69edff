//! Alert ingestion and delivery for Beacon.
//!
//! `beacon-alerts` turns Alertmanager webhook payloads into issues and delivers
//! a formatted notification to every destination of the responsible team.
//!
//! # Features
//!
//! - **Validation**: raw payloads are checked and normalized into an [`AlertEvent`]
//! - **Conversion**: each alert becomes an [`Issue`] with severity, subject and fingerprint
//! - **Enrichment**: labels and annotations are rendered as display blocks
//! - **Routing**: a [`TeamResolver`] picks the team that owns the event
//! - **Dispatch**: every destination is attempted; failures are aggregated, not short-circuited
//!
//! # Example
//!
//! ```rust
//! use beacon_alerts::{validate, IssueConverter, LabelEnricher, RawAlertEvent, Severity};
//!
//! let raw: RawAlertEvent = serde_json::from_str(r#"{
//!     "receiver": "beacon",
//!     "status": "firing",
//!     "alerts": [{
//!         "status": "firing",
//!         "labels": {"alertname": "HighCPU", "severity": "warning", "pod": "api-1"},
//!         "annotations": {"summary": "CPU usage is above 80%"},
//!         "startsAt": "2024-05-01T12:00:00Z"
//!     }]
//! }"#).unwrap();
//!
//! let event = validate(raw).unwrap();
//! let converter = IssueConverter::new().with_enricher(LabelEnricher::default());
//! let issues = converter.convert(&event).unwrap();
//!
//! assert_eq!(issues[0].title, "CPU usage is above 80%");
//! assert_eq!(issues[0].severity, Severity::Low);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod convert;
pub mod destination;
pub mod dispatch;
pub mod enrich;
pub mod error;
pub mod event;
pub mod issue;
pub mod metrics;
pub mod notification;
pub mod pipeline;
pub mod subject;
pub mod team;
pub mod toggle;

// Re-export main types at crate root
pub use convert::IssueConverter;
pub use destination::{
    Destination, DestinationConfig, DestinationFactory, DestinationRegistry, DestinationsConfig,
    SlackDestination, SlackDestinationConfig,
};
pub use dispatch::{AlertDispatcher, DispatchOutcome};
pub use enrich::{IssueEnricher, LabelEnricher, LabelEnrichmentConfig};
pub use error::{
    ConfigError, ConversionError, DeliveryFailure, DestinationError, DispatchError,
    EnrichmentError, PipelineError, RegistryError, ValidationError,
};
pub use event::{validate, Alert, AlertEvent, AlertStatus, RawAlertEvent};
pub use issue::{Issue, IssueStatus, Severity};
pub use metrics::{MetricsRecorder, NoopMetrics, PrometheusMetrics};
pub use notification::Notification;
pub use pipeline::{AlertPipeline, ProcessOutcome};
pub use subject::{Subject, SubjectType};
pub use team::{Team, TeamResolver, TeamsConfig};
pub use toggle::Toggle;
