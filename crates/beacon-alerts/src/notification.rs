//! Formatted notifications.
//!
//! A [`Notification`] is rendered once per dispatch and shared by every
//! destination. The text uses Slack-style markup (`*bold*`, `<url|text>`),
//! which degrades to readable plain text elsewhere.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::issue::{Issue, IssueStatus};

/// A rendered notification for one or more issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Firing if any issue is firing.
    pub status: IssueStatus,
    /// One-line summary.
    pub title: String,
    /// Full rendered body.
    pub text: String,
    /// The issues this notification describes.
    pub issues: Vec<Issue>,
}

impl Notification {
    /// Renders a notification for the given issues.
    #[must_use]
    pub fn from_issues(issues: &[Issue]) -> Self {
        let status = if issues.iter().any(Issue::is_firing) {
            IssueStatus::Firing
        } else {
            IssueStatus::Resolved
        };

        let title = match issues {
            [single] => single.status_message(),
            _ => format!("{} alerts {}", issues.len(), status),
        };

        let mut text = String::new();
        if issues.len() > 1 {
            let _ = writeln!(text, "*{title}*\n");
        }
        for (i, issue) in issues.iter().enumerate() {
            if i > 0 {
                text.push_str("\n---\n\n");
            }
            render_issue(&mut text, issue);
        }

        Self {
            status,
            title,
            text: text.trim_end().to_string(),
            issues: issues.to_vec(),
        }
    }

    /// Returns true if any issue is still firing.
    #[must_use]
    pub const fn is_firing(&self) -> bool {
        matches!(self.status, IssueStatus::Firing)
    }

    /// Non-empty fingerprints of the issues with `status`, in issue order.
    ///
    /// Destinations that thread messages use these to correlate a resolved
    /// issue with the message that announced it while firing.
    pub fn fingerprints(&self, status: IssueStatus) -> impl Iterator<Item = &str> {
        self.issues
            .iter()
            .filter(move |issue| issue.status == status)
            .map(|issue| issue.fingerprint.as_str())
            .filter(|fp| !fp.is_empty())
    }
}

fn render_issue(out: &mut String, issue: &Issue) {
    let _ = writeln!(
        out,
        "{} *{}*",
        issue.severity.emoji(),
        issue.status_message()
    );
    let _ = writeln!(
        out,
        "*Severity:* {}  *Status:* {}  *Subject:* {}",
        issue.severity,
        issue.status,
        issue.subject.display_name()
    );
    if !issue.description.is_empty() {
        let _ = writeln!(out, "{}", issue.description);
    }
    if !issue.links.is_empty() {
        let links: Vec<String> = issue
            .links
            .iter()
            .map(|link| format!("<{}|{}>", link.url, link.text))
            .collect();
        let _ = writeln!(out, "{}", links.join(" · "));
    }
    for enrichment in &issue.enrichments {
        let _ = writeln!(out, "*{}*", enrichment.title);
        for block in &enrichment.blocks {
            let _ = writeln!(out, "```\n{}\n```", block.render());
        }
    }
}
