//! Conversion of validated events into issues.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::enrich::IssueEnricher;
use crate::error::ConversionError;
use crate::event::{Alert, AlertEvent};
use crate::issue::{Issue, IssueStatus, Link, LinkType, Severity};
use crate::subject::Subject;

/// Description used when an alert carries nothing better.
pub const FALLBACK_DESCRIPTION: &str = "No description available";

/// Turns each alert of an [`AlertEvent`] into an [`Issue`].
///
/// Conversion is tolerant per alert: an alert that cannot be converted is
/// logged and skipped. The batch only fails if nothing survives.
#[derive(Debug, Clone, Default)]
pub struct IssueConverter {
    enrichers: Vec<Arc<dyn IssueEnricher>>,
}

impl IssueConverter {
    /// Creates a converter with no enrichers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an enricher, run on every issue in registration order.
    #[must_use]
    pub fn with_enricher(mut self, enricher: impl IssueEnricher + 'static) -> Self {
        self.enrichers.push(Arc::new(enricher));
        self
    }

    /// Returns the number of configured enrichers.
    #[must_use]
    pub fn enricher_count(&self) -> usize {
        self.enrichers.len()
    }

    /// Converts every alert in the event.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::NoAlerts`] for an empty event and
    /// [`ConversionError::NoIssuesProduced`] if every alert was skipped.
    pub fn convert(&self, event: &AlertEvent) -> Result<Vec<Issue>, ConversionError> {
        if event.alerts.is_empty() {
            return Err(ConversionError::NoAlerts);
        }

        let mut issues = Vec::with_capacity(event.alerts.len());
        let mut skipped = 0;

        for (index, alert) in event.alerts.iter().enumerate() {
            match self.convert_alert(index, alert) {
                Ok(issue) => issues.push(issue),
                Err(e) => {
                    error!(receiver = %event.receiver, index, error = %e, "skipping alert");
                    skipped += 1;
                }
            }
        }

        if issues.is_empty() {
            return Err(ConversionError::NoIssuesProduced { skipped });
        }

        debug!(
            receiver = %event.receiver,
            issues = issues.len(),
            skipped,
            "converted alertmanager event"
        );
        Ok(issues)
    }

    /// Converts a single alert.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::MissingAlertName`] if the alert has no name.
    pub fn convert_alert(&self, index: usize, alert: &Alert) -> Result<Issue, ConversionError> {
        let name = alert
            .name()
            .ok_or(ConversionError::MissingAlertName { index })?;

        let title = alert.annotation("summary").unwrap_or(name);
        let mut issue = Issue::new(name, title, Subject::from_alert(alert));

        issue.description = describe(alert);
        issue.severity = Severity::from_label(alert.label("severity"));
        issue.status = IssueStatus::from_alert_status(alert.status.as_str());
        issue.starts_at = alert.starts_at;
        issue.ends_at = alert.ends_at;

        if let Some(fingerprint) = alert.fingerprint.as_deref().filter(|f| !f.is_empty()) {
            issue.fingerprint = fingerprint.to_string();
        }

        if let Some(url) = &alert.generator_url {
            issue.add_link(Link::new("Generator URL", url.clone(), LinkType::Generator));
        }
        if let Some(url) = alert.annotation("runbook_url").filter(|u| !u.is_empty()) {
            issue.add_link(Link::new("Runbook", url, LinkType::Runbook));
        }

        for enricher in &self.enrichers {
            if let Err(e) = enricher.enrich(&mut issue) {
                warn!(
                    enricher = enricher.name(),
                    alert = name,
                    error = %e,
                    "enrichment failed, continuing"
                );
            }
        }

        Ok(issue)
    }
}

fn describe(alert: &Alert) -> String {
    alert
        .annotation("description")
        .or_else(|| alert.annotation("summary"))
        .map(str::to_string)
        .or_else(|| alert.name().map(|name| format!("Alert: {name}")))
        .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::LabelEnricher;
    use crate::error::EnrichmentError;
    use crate::event::{AlertStatus, LabelSet};
    use crate::issue::compute_fingerprint;
    use crate::subject::SubjectType;
    use chrono::Utc;

    fn event(alerts: Vec<Alert>) -> AlertEvent {
        AlertEvent {
            receiver: "x".to_string(),
            status: "firing".to_string(),
            external_url: None,
            group_key: String::new(),
            version: "4".to_string(),
            truncated_alerts: 0,
            common_labels: LabelSet::new(),
            common_annotations: LabelSet::new(),
            group_labels: LabelSet::new(),
            alerts,
        }
    }

    fn nameless() -> Alert {
        let mut alert = Alert::firing("gone");
        alert.labels.clear();
        alert
    }

    #[derive(Debug)]
    struct FailingEnricher;

    impl IssueEnricher for FailingEnricher {
        fn name(&self) -> &str {
            "failing"
        }

        fn enrich(&self, _issue: &mut Issue) -> Result<(), EnrichmentError> {
            Err(EnrichmentError::Render {
                section: "labels",
                reason: "boom".to_string(),
            })
        }
    }

    mod batch_tests {
        use super::*;

        #[test]
        fn minimal_alert_converts_with_defaults() {
            let issues = IssueConverter::new().convert(&event(vec![Alert::firing("A")])).unwrap();

            assert_eq!(issues.len(), 1);
            let issue = &issues[0];
            assert_eq!(issue.severity, Severity::Info);
            assert_eq!(issue.status, IssueStatus::Firing);
            assert_eq!(issue.title, "A");
            assert_eq!(issue.aggregation_key, "A");
            assert_eq!(issue.description, "Alert: A");
            assert_eq!(issue.subject.subject_type, SubjectType::None);
            assert!(issue.ends_at.is_none());
        }

        #[test]
        fn empty_event_is_rejected() {
            let err = IssueConverter::new().convert(&event(vec![])).unwrap_err();
            assert_eq!(err, ConversionError::NoAlerts);
        }

        #[test]
        fn bad_alerts_are_skipped() {
            let alerts = vec![Alert::firing("A"), nameless(), Alert::firing("C")];
            let issues = IssueConverter::new().convert(&event(alerts)).unwrap();

            let keys: Vec<_> = issues.iter().map(|i| i.aggregation_key.as_str()).collect();
            assert_eq!(keys, vec!["A", "C"]);
        }

        #[test]
        fn all_skipped_is_an_error() {
            let err = IssueConverter::new()
                .convert(&event(vec![nameless(), nameless()]))
                .unwrap_err();
            assert_eq!(err, ConversionError::NoIssuesProduced { skipped: 2 });
        }

        #[test]
        fn enrichment_failure_does_not_fail_conversion() {
            let converter = IssueConverter::new().with_enricher(FailingEnricher);
            let issues = converter.convert(&event(vec![Alert::firing("A")])).unwrap();
            assert_eq!(issues.len(), 1);
            assert!(issues[0].enrichments.is_empty());
        }

        #[test]
        fn enrichers_are_applied() {
            let converter = IssueConverter::new().with_enricher(LabelEnricher::default());
            assert_eq!(converter.enricher_count(), 1);
            let issues = converter.convert(&event(vec![Alert::firing("A")])).unwrap();
            assert_eq!(issues[0].enrichments.len(), 1);
        }
    }

    mod field_tests {
        use super::*;

        fn convert_one(alert: Alert) -> Issue {
            IssueConverter::new().convert_alert(0, &alert).unwrap()
        }

        #[test]
        fn title_prefers_summary() {
            let issue = convert_one(Alert::firing("A").with_annotation("summary", "Disk full"));
            assert_eq!(issue.title, "Disk full");
            assert_eq!(issue.description, "Disk full");
        }

        #[test]
        fn empty_summary_is_kept() {
            let issue = convert_one(Alert::firing("A").with_annotation("summary", ""));
            assert_eq!(issue.title, "");
            assert_eq!(issue.description, "");
        }

        #[test]
        fn resolved_without_start_time_keeps_none() {
            let mut alert = Alert::firing("A").with_status(AlertStatus::Resolved);
            alert.starts_at = None;
            alert.ends_at = Some(Utc::now());
            let issue = convert_one(alert);
            assert_eq!(issue.starts_at, None);
        }

        #[test]
        fn description_prefers_description() {
            let issue = convert_one(
                Alert::firing("A")
                    .with_annotation("summary", "Disk full")
                    .with_annotation("description", "Volume /data at 98%"),
            );
            assert_eq!(issue.description, "Volume /data at 98%");
        }

        #[test]
        fn resolved_status_and_end_time() {
            let mut alert = Alert::firing("A").with_status(AlertStatus::Resolved);
            let ended = Utc::now();
            alert.ends_at = Some(ended);
            let issue = convert_one(alert);

            assert_eq!(issue.status, IssueStatus::Resolved);
            assert_eq!(issue.ends_at, Some(ended));
        }

        #[test]
        fn severity_from_label() {
            let issue = convert_one(Alert::firing("A").with_label("severity", "critical"));
            assert_eq!(issue.severity, Severity::High);
        }

        #[test]
        fn links_in_order() {
            let mut alert = Alert::firing("A").with_annotation("runbook_url", "https://runbooks/a");
            alert.generator_url = Some("http://prometheus/graph".to_string());
            let issue = convert_one(alert);

            assert_eq!(issue.links.len(), 2);
            assert_eq!(issue.links[0].text, "Generator URL");
            assert_eq!(issue.links[0].link_type, LinkType::Generator);
            assert_eq!(issue.links[1].text, "Runbook");
            assert_eq!(issue.links[1].url, "https://runbooks/a");
        }

        #[test]
        fn empty_runbook_is_not_linked() {
            let issue = convert_one(Alert::firing("A").with_annotation("runbook_url", ""));
            assert!(issue.links.is_empty());
        }

        #[test]
        fn source_fingerprint_wins() {
            let mut alert = Alert::firing("A");
            alert.fingerprint = Some("abc123".to_string());
            assert_eq!(convert_one(alert).fingerprint, "abc123");
        }

        #[test]
        fn derived_fingerprint_is_stable() {
            let alert = Alert::firing("A")
                .with_label("pod", "api")
                .with_label("namespace", "payments");
            let first = convert_one(alert.clone());
            let second = convert_one(alert);

            assert_eq!(first.fingerprint, second.fingerprint);
            assert_eq!(
                first.fingerprint,
                compute_fingerprint(&first.subject, first.source, "A")
            );
            assert_ne!(first.id, second.id);
        }

        #[test]
        fn subject_is_classified() {
            let issue = convert_one(
                Alert::firing("A")
                    .with_label("deployment", "api")
                    .with_label("namespace", "payments"),
            );
            assert_eq!(issue.subject.subject_type, SubjectType::Deployment);
            assert_eq!(issue.subject.name, "api");
            assert_eq!(issue.subject.namespace.as_deref(), Some("payments"));
        }

        #[test]
        fn describe_falls_back() {
            let alert = nameless();
            assert_eq!(describe(&alert), FALLBACK_DESCRIPTION);
        }
    }
}
