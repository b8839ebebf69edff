//! Pipeline metrics.
//!
//! The pipeline reports through the [`MetricsRecorder`] trait.
//! [`PrometheusMetrics`] backs it with `prometheus-client` families and
//! encodes the text exposition format; [`NoopMetrics`] discards everything.
//!
//! # Example
//!
//! ```rust
//! use beacon_alerts::metrics::{MetricsRecorder, PrometheusMetrics};
//!
//! let metrics = PrometheusMetrics::new();
//! metrics.alert_received("beacon", "firing");
//! metrics.destination_sent("ops", "slack");
//!
//! let output = metrics.encode();
//! assert!(output.contains("beacon_alerts_received_total"));
//! ```

use std::fmt;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Final outcome of processing one event, as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Delivered to every destination of the resolved team.
    Processed,
    /// No team was configured.
    NoTeamResolved,
    /// The resolved team has no destinations.
    NoDestinations,
}

impl Outcome {
    /// Returns the outcome as a label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::NoTeamResolved => "no_team_resolved",
            Self::NoDestinations => "no_destinations",
        }
    }
}

/// Sink for pipeline metrics.
pub trait MetricsRecorder: Send + Sync + fmt::Debug {
    /// A webhook event arrived and passed parsing.
    fn alert_received(&self, receiver: &str, status: &str);

    /// An event finished processing.
    fn alert_processed(&self, alert: &str, severity: &str, outcome: Outcome);

    /// An event failed at some stage.
    fn alert_failed(&self, alert: &str, reason: &str);

    /// A destination accepted a notification.
    fn destination_sent(&self, destination: &str, kind: &str);

    /// A destination rejected a notification or could not be reached.
    fn destination_failed(&self, destination: &str, kind: &str);

    /// Time taken by one destination send, successful or not.
    fn observe_send_duration(&self, destination: &str, kind: &str, seconds: f64);
}

/// Discards every metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn alert_received(&self, _receiver: &str, _status: &str) {}
    fn alert_processed(&self, _alert: &str, _severity: &str, _outcome: Outcome) {}
    fn alert_failed(&self, _alert: &str, _reason: &str) {}
    fn destination_sent(&self, _destination: &str, _kind: &str) {}
    fn destination_failed(&self, _destination: &str, _kind: &str) {}
    fn observe_send_duration(&self, _destination: &str, _kind: &str, _seconds: f64) {}
}

/// Label set for received events.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReceivedLabels {
    /// Alertmanager receiver.
    pub receiver: String,
    /// Group status.
    pub status: String,
}

/// Label set for processed events.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProcessedLabels {
    /// Name of the first alert.
    pub alertname: String,
    /// Severity label of the first alert.
    pub severity: String,
    /// Processing outcome.
    pub outcome: String,
}

/// Label set for failed events.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    /// Name of the first alert.
    pub alertname: String,
    /// Stage that failed.
    pub reason: String,
}

/// Label set for destination metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DestinationLabels {
    /// Destination name.
    pub destination: String,
    /// Destination kind.
    pub kind: String,
}

type HistogramFamily = Family<DestinationLabels, Histogram, fn() -> Histogram>;

// 5ms to ~10s.
fn send_duration_histogram() -> Histogram {
    Histogram::new(exponential_buckets(0.005, 2.0, 12))
}

/// Prometheus-backed metrics.
pub struct PrometheusMetrics {
    registry: Registry,
    alerts_received: Family<ReceivedLabels, Counter>,
    alerts_processed: Family<ProcessedLabels, Counter>,
    alert_errors: Family<ErrorLabels, Counter>,
    destination_messages: Family<DestinationLabels, Counter>,
    destination_errors: Family<DestinationLabels, Counter>,
    send_duration_seconds: HistogramFamily,
}

impl fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusMetrics {
    /// Creates the metric families and registers them.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let alerts_received = Family::<ReceivedLabels, Counter>::default();
        registry.register(
            "beacon_alerts_received",
            "Webhook events received",
            alerts_received.clone(),
        );

        let alerts_processed = Family::<ProcessedLabels, Counter>::default();
        registry.register(
            "beacon_alerts_processed",
            "Webhook events processed, by outcome",
            alerts_processed.clone(),
        );

        let alert_errors = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "beacon_alert_errors",
            "Webhook events that failed, by stage",
            alert_errors.clone(),
        );

        let destination_messages = Family::<DestinationLabels, Counter>::default();
        registry.register(
            "beacon_destination_messages",
            "Notifications accepted by a destination",
            destination_messages.clone(),
        );

        let destination_errors = Family::<DestinationLabels, Counter>::default();
        registry.register(
            "beacon_destination_errors",
            "Notifications a destination failed to deliver",
            destination_errors.clone(),
        );

        let send_duration_seconds: HistogramFamily =
            Family::new_with_constructor(send_duration_histogram);
        registry.register(
            "beacon_destination_send_duration_seconds",
            "Time spent sending to a destination",
            send_duration_seconds.clone(),
        );

        Self {
            registry,
            alerts_received,
            alerts_processed,
            alert_errors,
            destination_messages,
            destination_errors,
            send_duration_seconds,
        }
    }

    /// Encodes all metrics in the Prometheus text format.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("failed to encode prometheus metrics");
            return String::new();
        }
        buffer
    }

    /// Returns the Content-Type header value for the encoded output.
    #[must_use]
    pub const fn content_type() -> &'static str {
        "text/plain; version=0.0.4; charset=utf-8"
    }

    fn destination_labels(destination: &str, kind: &str) -> DestinationLabels {
        DestinationLabels {
            destination: destination.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl MetricsRecorder for PrometheusMetrics {
    fn alert_received(&self, receiver: &str, status: &str) {
        self.alerts_received
            .get_or_create(&ReceivedLabels {
                receiver: receiver.to_string(),
                status: status.to_string(),
            })
            .inc();
    }

    fn alert_processed(&self, alert: &str, severity: &str, outcome: Outcome) {
        self.alerts_processed
            .get_or_create(&ProcessedLabels {
                alertname: alert.to_string(),
                severity: severity.to_string(),
                outcome: outcome.as_str().to_string(),
            })
            .inc();
    }

    fn alert_failed(&self, alert: &str, reason: &str) {
        self.alert_errors
            .get_or_create(&ErrorLabels {
                alertname: alert.to_string(),
                reason: reason.to_string(),
            })
            .inc();
    }

    fn destination_sent(&self, destination: &str, kind: &str) {
        self.destination_messages
            .get_or_create(&Self::destination_labels(destination, kind))
            .inc();
    }

    fn destination_failed(&self, destination: &str, kind: &str) {
        self.destination_errors
            .get_or_create(&Self::destination_labels(destination, kind))
            .inc();
    }

    fn observe_send_duration(&self, destination: &str, kind: &str, seconds: f64) {
        self.send_duration_seconds
            .get_or_create(&Self::destination_labels(destination, kind))
            .observe(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_families() {
        let metrics = PrometheusMetrics::new();
        metrics.alert_received("beacon", "firing");
        metrics.alert_processed("HighCPU", "warning", Outcome::Processed);
        metrics.alert_failed("HighCPU", "dispatch_failed");
        metrics.destination_sent("ops", "slack");
        metrics.destination_failed("sre", "slack");
        metrics.observe_send_duration("ops", "slack", 0.02);

        let output = metrics.encode();
        assert!(output.contains(r#"beacon_alerts_received_total{receiver="beacon",status="firing"} 1"#));
        assert!(output.contains(r#"outcome="processed""#));
        assert!(output.contains(r#"beacon_alert_errors_total{alertname="HighCPU",reason="dispatch_failed"} 1"#));
        assert!(output.contains("beacon_destination_messages_total"));
        assert!(output.contains("beacon_destination_errors_total"));
        assert!(output.contains("beacon_destination_send_duration_seconds_bucket"));
    }

    #[test]
    fn counters_accumulate() {
        let metrics = PrometheusMetrics::new();
        metrics.destination_sent("ops", "slack");
        metrics.destination_sent("ops", "slack");
        let output = metrics.encode();
        assert!(output.contains(r#"beacon_destination_messages_total{destination="ops",kind="slack"} 2"#));
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(Outcome::Processed.as_str(), "processed");
        assert_eq!(Outcome::NoTeamResolved.as_str(), "no_team_resolved");
        assert_eq!(Outcome::NoDestinations.as_str(), "no_destinations");
    }

    #[test]
    fn content_type_is_prometheus_text() {
        assert!(PrometheusMetrics::content_type().starts_with("text/plain"));
    }
}
