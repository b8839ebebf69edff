//! Issue enrichment.
//!
//! Enrichers run after an issue is built and attach extra context to it.
//! [`LabelEnricher`] renders the alert's labels and annotations as tables or
//! JSON, filtered by include and exclude lists.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EnrichmentError;
use crate::event::LabelSet;
use crate::issue::{Block, Enrichment, EnrichmentKind, Issue};
use crate::toggle::Toggle;

/// Something that adds context to an issue after conversion.
///
/// Enrichers must not change severity, status or fingerprint.
pub trait IssueEnricher: Send + Sync + fmt::Debug {
    /// Returns the name of this enricher.
    fn name(&self) -> &str;

    /// Enriches the issue in place.
    ///
    /// # Errors
    ///
    /// Returns an [`EnrichmentError`] if some content could not be rendered.
    /// The issue may be partially enriched.
    fn enrich(&self, issue: &mut Issue) -> Result<(), EnrichmentError>;
}

/// How a section is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DisplayFormat {
    /// Two-column key/value table.
    #[default]
    Table,
    /// Pretty-printed JSON object.
    Json,
}

impl DisplayFormat {
    /// Returns the format as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
        }
    }
}

// Unknown formats fall back to a table rather than failing configuration.
impl From<String> for DisplayFormat {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Table
        }
    }
}

impl From<DisplayFormat> for String {
    fn from(value: DisplayFormat) -> Self {
        value.as_str().to_string()
    }
}

/// Settings for one enrichment section (labels or annotations).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    /// Whether the section is rendered. Unset means enabled.
    pub enabled: Toggle,
    /// Display format. Unset falls back to the label section's format, then table.
    pub display_format: Option<DisplayFormat>,
    /// If non-empty, only keys matching one of these patterns are shown.
    pub include: Vec<String>,
    /// Keys matching any of these patterns are never shown.
    pub exclude: Vec<String>,
}

impl SectionConfig {
    /// Returns true if `key` survives the include and exclude lists.
    ///
    /// A pattern matches a key exactly, or as a prefix when it ends in `*`.
    #[must_use]
    pub fn allows(&self, key: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| matches(p, key));
        included && !self.exclude.iter().any(|p| matches(p, key))
    }
}

fn matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => pattern == key,
    }
}

/// Configuration for [`LabelEnricher`]. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelEnrichmentConfig {
    /// Label section settings.
    pub labels: SectionConfig,
    /// Annotation section settings.
    pub annotations: SectionConfig,
}

impl LabelEnrichmentConfig {
    /// Hides Prometheus bookkeeping labels and annotations already shown elsewhere.
    #[must_use]
    pub fn recommended() -> Self {
        let strings = |items: &[&str]| -> Vec<String> {
            items.iter().map(ToString::to_string).collect()
        };
        Self {
            labels: SectionConfig {
                exclude: strings(&[
                    "__name__",
                    "job",
                    "instance",
                    "endpoint",
                    "prometheus",
                    "service",
                    "uid",
                ]),
                ..SectionConfig::default()
            },
            annotations: SectionConfig {
                exclude: strings(&["runbook_url", "kubectl.kubernetes.io/*"]),
                ..SectionConfig::default()
            },
        }
    }

    /// Effective label format.
    #[must_use]
    pub fn label_format(&self) -> DisplayFormat {
        self.labels.display_format.unwrap_or_default()
    }

    /// Effective annotation format, falling back to the label format.
    #[must_use]
    pub fn annotation_format(&self) -> DisplayFormat {
        self.annotations
            .display_format
            .unwrap_or_else(|| self.label_format())
    }
}

/// Renders alert labels and annotations onto an issue.
#[derive(Debug, Clone, Default)]
pub struct LabelEnricher {
    config: LabelEnrichmentConfig,
}

impl LabelEnricher {
    /// Creates an enricher with the given configuration.
    #[must_use]
    pub const fn new(config: LabelEnrichmentConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &LabelEnrichmentConfig {
        &self.config
    }

    fn section(
        kind: EnrichmentKind,
        source: &LabelSet,
        config: &SectionConfig,
        format: DisplayFormat,
    ) -> Result<Option<Enrichment>, EnrichmentError> {
        let (title, header, section) = match kind {
            EnrichmentKind::AlertLabels => ("Alert Labels", "Label", "labels"),
            EnrichmentKind::AlertAnnotations => ("Alert Annotations", "Annotation", "annotations"),
        };

        let entries: BTreeMap<&str, &str> = source
            .iter()
            .filter(|(key, _)| config.allows(key))
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        if entries.is_empty() {
            return Ok(None);
        }

        let block = match format {
            DisplayFormat::Table => Block::Table {
                headers: vec![header.to_string(), "Value".to_string()],
                rows: entries
                    .iter()
                    .map(|(k, v)| vec![(*k).to_string(), (*v).to_string()])
                    .collect(),
            },
            DisplayFormat::Json => Block::Json {
                content: serde_json::to_string_pretty(&entries).map_err(|e| {
                    EnrichmentError::Render {
                        section,
                        reason: e.to_string(),
                    }
                })?,
            },
        };

        Ok(Some(Enrichment {
            kind,
            title: title.to_string(),
            blocks: vec![block],
        }))
    }
}

impl IssueEnricher for LabelEnricher {
    fn name(&self) -> &str {
        "labels"
    }

    fn enrich(&self, issue: &mut Issue) -> Result<(), EnrichmentError> {
        let mut first_error = None;

        let sections = [
            (
                EnrichmentKind::AlertLabels,
                &self.config.labels,
                self.config.label_format(),
            ),
            (
                EnrichmentKind::AlertAnnotations,
                &self.config.annotations,
                self.config.annotation_format(),
            ),
        ];

        for (kind, section, format) in sections {
            if !section.enabled.is_enabled() {
                continue;
            }
            let source = match kind {
                EnrichmentKind::AlertLabels => &issue.subject.labels,
                EnrichmentKind::AlertAnnotations => &issue.subject.annotations,
            };
            match Self::section(kind, source, section, format) {
                Ok(Some(enrichment)) => issue.add_enrichment(enrichment),
                Ok(None) => debug!(issue = %issue.aggregation_key, ?kind, "nothing to enrich"),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
