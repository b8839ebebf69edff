//! Inbound Alertmanager webhook events.
//!
//! [`RawAlertEvent`] mirrors the JSON body exactly and accepts anything that
//! parses. [`validate`] turns it into an [`AlertEvent`], the only form the
//! rest of the pipeline accepts.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Label and annotation mapping. Ordered so rendered output is stable.
pub type LabelSet = BTreeMap<String, String>;

/// The label every alert must carry.
pub const ALERT_NAME_LABEL: &str = "alertname";

/// A webhook body as sent by Alertmanager, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAlertEvent {
    /// Receiver that routed the notification.
    pub receiver: String,
    /// Overall group status.
    pub status: String,
    /// Alerts in the group.
    #[serde(deserialize_with = "nullable")]
    pub alerts: Vec<RawAlert>,
    /// Link back to the Alertmanager instance.
    #[serde(rename = "externalURL")]
    pub external_url: String,
    /// Alertmanager group key.
    pub group_key: String,
    /// Webhook payload version.
    pub version: String,
    /// Number of alerts Alertmanager dropped from this payload.
    pub truncated_alerts: u64,
    /// Labels shared by every alert in the group.
    #[serde(deserialize_with = "nullable")]
    pub common_labels: LabelSet,
    /// Annotations shared by every alert in the group.
    #[serde(deserialize_with = "nullable")]
    pub common_annotations: LabelSet,
    /// Labels the group was formed on.
    #[serde(deserialize_with = "nullable")]
    pub group_labels: LabelSet,
}

/// One alert inside a [`RawAlertEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAlert {
    /// `firing` or `resolved`.
    pub status: String,
    /// Alert labels.
    #[serde(deserialize_with = "nullable")]
    pub labels: LabelSet,
    /// Alert annotations.
    #[serde(deserialize_with = "nullable")]
    pub annotations: LabelSet,
    /// When the alert started firing. Zero timestamps decode as `None`.
    #[serde(deserialize_with = "timestamp")]
    pub starts_at: Option<DateTime<Utc>>,
    /// When the alert resolved. Zero timestamps decode as `None`.
    #[serde(deserialize_with = "timestamp")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Link to the expression that generated the alert.
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    /// Alertmanager fingerprint.
    pub fingerprint: String,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Alertmanager encodes "unset" as the zero time `0001-01-01T00:00:00Z`.
fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    let parsed = DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)?;
    let parsed = parsed.with_timezone(&Utc);
    Ok((parsed.year() > 1).then_some(parsed))
}

/// Status of a single alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// The condition is active.
    Firing,
    /// The condition cleared.
    Resolved,
}

impl AlertStatus {
    /// Parses the wire value. Matching is exact.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "firing" => Some(Self::Firing),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    /// Receiver that routed the notification.
    pub receiver: String,
    /// Overall group status as reported.
    pub status: String,
    /// Link back to the Alertmanager instance.
    pub external_url: Option<String>,
    /// Alertmanager group key.
    pub group_key: String,
    /// Webhook payload version.
    pub version: String,
    /// Number of alerts Alertmanager dropped from this payload.
    pub truncated_alerts: u64,
    /// Labels shared by every alert in the group.
    pub common_labels: LabelSet,
    /// Annotations shared by every alert in the group.
    pub common_annotations: LabelSet,
    /// Labels the group was formed on.
    pub group_labels: LabelSet,
    /// Alerts in source order.
    pub alerts: Vec<Alert>,
}

impl AlertEvent {
    /// Name of the first alert, used to label metrics for the whole event.
    #[must_use]
    pub fn alert_name(&self) -> &str {
        self.alerts
            .first()
            .and_then(Alert::name)
            .unwrap_or("unknown")
    }

    /// Severity label of the first alert, or `unknown`.
    #[must_use]
    pub fn severity_label(&self) -> &str {
        self.alerts
            .first()
            .and_then(|alert| alert.label("severity"))
            .unwrap_or("unknown")
    }
}

impl TryFrom<RawAlertEvent> for AlertEvent {
    type Error = ValidationError;

    fn try_from(raw: RawAlertEvent) -> Result<Self, Self::Error> {
        validate(raw)
    }
}

/// A single validated alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Firing or resolved.
    pub status: AlertStatus,
    /// Alert labels; contains `alertname` once validated.
    pub labels: LabelSet,
    /// Alert annotations.
    pub annotations: LabelSet,
    /// Start time. Always set for firing alerts.
    pub starts_at: Option<DateTime<Utc>>,
    /// End time, if the source reported one.
    pub ends_at: Option<DateTime<Utc>>,
    /// Link to the expression that generated the alert.
    pub generator_url: Option<String>,
    /// Fingerprint supplied by the source.
    pub fingerprint: Option<String>,
}

impl Alert {
    /// Creates a firing alert with the given name, starting now.
    #[must_use]
    pub fn firing(name: impl Into<String>) -> Self {
        let mut labels = LabelSet::new();
        labels.insert(ALERT_NAME_LABEL.to_string(), name.into());
        Self {
            status: AlertStatus::Firing,
            labels,
            annotations: LabelSet::new(),
            starts_at: Some(Utc::now()),
            ends_at: None,
            generator_url: None,
            fingerprint: None,
        }
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: AlertStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns the `alertname` label, if present. It may be empty.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.label(ALERT_NAME_LABEL)
    }

    /// Returns a label value, if the key is present.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Returns an annotation value, if the key is present.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

fn non_empty_owned(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Validates a raw event.
///
/// Checks run in a fixed order: receiver, status, presence of alerts, then
/// each alert by index (status, `alertname`, start time for firing alerts).
/// The first violation rejects the whole event.
pub fn validate(raw: RawAlertEvent) -> Result<AlertEvent, ValidationError> {
    if raw.receiver.is_empty() {
        return Err(ValidationError::MissingReceiver);
    }
    if raw.status.is_empty() {
        return Err(ValidationError::MissingStatus);
    }
    if raw.alerts.is_empty() {
        return Err(ValidationError::MissingAlerts);
    }

    let alerts = raw
        .alerts
        .into_iter()
        .enumerate()
        .map(|(index, alert)| validate_alert(index, alert))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AlertEvent {
        receiver: raw.receiver,
        status: raw.status,
        external_url: non_empty_owned(raw.external_url),
        group_key: raw.group_key,
        version: raw.version,
        truncated_alerts: raw.truncated_alerts,
        common_labels: raw.common_labels,
        common_annotations: raw.common_annotations,
        group_labels: raw.group_labels,
        alerts,
    })
}

fn validate_alert(index: usize, raw: RawAlert) -> Result<Alert, ValidationError> {
    let status = AlertStatus::parse(&raw.status).ok_or_else(|| {
        ValidationError::InvalidAlertStatus {
            index,
            status: raw.status.clone(),
        }
    })?;

    if !raw.labels.contains_key(ALERT_NAME_LABEL) {
        return Err(ValidationError::MissingAlertName { index });
    }

    if status == AlertStatus::Firing && raw.starts_at.is_none() {
        return Err(ValidationError::MissingStartTime { index });
    }

    Ok(Alert {
        status,
        labels: raw.labels,
        annotations: raw.annotations,
        starts_at: raw.starts_at,
        ends_at: raw.ends_at,
        generator_url: non_empty_owned(raw.generator_url),
        fingerprint: non_empty_owned(raw.fingerprint),
    })
}
