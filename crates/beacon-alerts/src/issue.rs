//! The normalized issue record and its parts.
//!
//! - [`Severity`]: Urgency of an issue
//! - [`IssueStatus`]: Whether the underlying condition is still active
//! - [`Source`]: Which monitoring system reported it
//! - [`Link`]: Related URLs (generator expression, runbook)
//! - [`Enrichment`] and [`Block`]: Rendered label and annotation context
//! - [`Issue`]: One alert after conversion

use std::fmt;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::subject::Subject;

/// Urgency of an issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Immediate action required.
    Critical,
    /// Needs attention soon.
    High,
    /// Should be looked at.
    Low,
    /// Informational.
    #[default]
    Info,
    /// Diagnostic noise.
    Debug,
}

impl Severity {
    /// Maps an alert `severity` label. Matching is case-sensitive; unknown or
    /// absent values map to [`Severity::Info`].
    #[must_use]
    pub fn from_label(value: Option<&str>) -> Self {
        match value {
            Some("critical" | "high" | "error") => Self::High,
            Some("warning" | "low") => Self::Low,
            Some("debug") => Self::Debug,
            _ => Self::Info,
        }
    }

    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Low => "low",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// Marker used when rendering notifications.
    #[must_use]
    pub const fn emoji(&self) -> &'static str {
        match self {
            Self::Critical => "🔥",
            Self::High => "🔴",
            Self::Low => "🟡",
            Self::Info => "🔵",
            Self::Debug => "⚪",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the condition behind an issue is still active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    /// Still active.
    #[default]
    Firing,
    /// Cleared.
    Resolved,
}

impl IssueStatus {
    /// Maps an alert status string. Anything but `resolved` is firing.
    #[must_use]
    pub fn from_alert_status(value: &str) -> Self {
        if value == "resolved" {
            Self::Resolved
        } else {
            Self::Firing
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

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The monitoring system that reported an issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Prometheus via Alertmanager.
    #[default]
    Prometheus,
}

impl Source {
    /// Returns the source as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Prometheus => "prometheus",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a [`Link`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// The expression that generated the alert.
    Generator,
    /// Operator runbook.
    Runbook,
    /// Anything else.
    General,
}

/// A URL attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Link text.
    pub text: String,
    /// Target URL.
    pub url: String,
    /// Kind of link.
    pub link_type: LinkType,
}

impl Link {
    /// Creates a new link.
    #[must_use]
    pub fn new(text: impl Into<String>, url: impl Into<String>, link_type: LinkType) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
            link_type,
        }
    }
}

/// What an [`Enrichment`] was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentKind {
    /// The alert's labels.
    AlertLabels,
    /// The alert's annotations.
    AlertAnnotations,
}

/// A renderable piece of enrichment content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Rows of cells under a header row.
    Table {
        /// Column headers.
        headers: Vec<String>,
        /// Rows, each as long as `headers`.
        rows: Vec<Vec<String>>,
    },
    /// Pre-rendered JSON.
    Json {
        /// Pretty-printed JSON document.
        content: String,
    },
}

impl Block {
    /// Renders the block as monospace text.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Table { headers, rows } => render_table(headers, rows),
            Self::Json { content } => content.clone(),
        }
    }
}

fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    write_row(&mut out, headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_row(&mut out, &rule, &widths);
    for row in rows {
        write_row(&mut out, row, &widths);
    }
    out.truncate(out.trim_end().len());
    out
}

fn write_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ");
    let _ = writeln!(out, "{}", line.trim_end());
}

/// Label or annotation context attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    /// What this was derived from.
    pub kind: EnrichmentKind,
    /// Section title.
    pub title: String,
    /// Content blocks, in display order.
    pub blocks: Vec<Block>,
}

/// An alert after conversion into the internal issue model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier for this issue.
    pub id: Uuid,
    /// Short human title.
    pub title: String,
    /// Longer human description.
    pub description: String,
    /// Grouping key, the alert name.
    pub aggregation_key: String,
    /// Urgency.
    pub severity: Severity,
    /// Firing or resolved.
    pub status: IssueStatus,
    /// Reporting system.
    pub source: Source,
    /// When the condition started, if the source reported it.
    pub starts_at: Option<DateTime<Utc>>,
    /// When the condition ended, if it has.
    pub ends_at: Option<DateTime<Utc>>,
    /// Stable identifier of the underlying condition.
    pub fingerprint: String,
    /// The resource the issue concerns.
    pub subject: Subject,
    /// Related links, in insertion order.
    pub links: Vec<Link>,
    /// Rendered context added by enrichers.
    pub enrichments: Vec<Enrichment>,
}

impl Issue {
    /// Creates a firing, info-level issue for the given subject.
    ///
    /// The fingerprint is derived from the subject, source and aggregation key.
    #[must_use]
    pub fn new(aggregation_key: impl Into<String>, title: impl Into<String>, subject: Subject) -> Self {
        let aggregation_key = aggregation_key.into();
        let source = Source::default();
        let fingerprint = compute_fingerprint(&subject, source, &aggregation_key);
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            aggregation_key,
            severity: Severity::default(),
            status: IssueStatus::default(),
            source,
            starts_at: Some(Utc::now()),
            ends_at: None,
            fingerprint,
            subject,
            links: Vec::new(),
            enrichments: Vec::new(),
        }
    }

    /// Appends a link.
    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    /// Appends an enrichment.
    pub fn add_enrichment(&mut self, enrichment: Enrichment) {
        self.enrichments.push(enrichment);
    }

    /// Returns true if the issue is still firing.
    #[must_use]
    pub const fn is_firing(&self) -> bool {
        matches!(self.status, IssueStatus::Firing)
    }

    /// Title prefixed with `[RESOLVED]` when the issue has cleared.
    #[must_use]
    pub fn status_message(&self) -> String {
        match self.status {
            IssueStatus::Firing => self.title.clone(),
            IssueStatus::Resolved => format!("[RESOLVED] {}", self.title),
        }
    }
}

/// Derives a fingerprint from the fields that identify a condition.
///
/// SHA-256 over subject type, subject name, namespace, node, source and
/// aggregation key, hex encoded. Each field is length-prefixed and optional
/// fields carry a presence tag, so no two field tuples share an encoding.
#[must_use]
pub fn compute_fingerprint(subject: &Subject, source: Source, aggregation_key: &str) -> String {
    let mut hasher = Sha256::new();
    hash_field(&mut hasher, subject.subject_type.as_str());
    hash_field(&mut hasher, &subject.name);
    hash_optional(&mut hasher, subject.namespace.as_deref());
    hash_optional(&mut hasher, subject.node.as_deref());
    hash_field(&mut hasher, source.as_str());
    hash_field(&mut hasher, aggregation_key);
    hex::encode(hasher.finalize())
}

fn hash_field(hasher: &mut Sha256, field: &str) {
    let len = u64::try_from(field.len()).unwrap_or(u64::MAX);
    hasher.update(len.to_be_bytes());
    hasher.update(field.as_bytes());
}

fn hash_optional(hasher: &mut Sha256, field: Option<&str>) {
    match field {
        Some(value) => {
            hasher.update([1_u8]);
            hash_field(hasher, value);
        }
        None => hasher.update([0_u8]),
    }
}
