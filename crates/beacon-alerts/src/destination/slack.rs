//! Slack destination.
//!
//! Posts notifications to a channel with `chat.postMessage`. With threading
//! enabled, a resolved notification is posted as a reply to the message that
//! announced the same fingerprint while it was firing.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Destination;
use crate::error::{ConfigError, DestinationError};
use crate::issue::IssueStatus;
use crate::notification::Notification;
use crate::toggle::Toggle;

/// Destination kind.
pub const KIND: &str = "slack";

/// Slack Web API base URL.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// How long a firing message stays eligible as a thread parent.
pub const DEFAULT_THREAD_TTL_SECS: u64 = 24 * 60 * 60;

const MAX_ERROR_BODY: usize = 512;

/// Reply threading for resolved notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadingConfig {
    /// Whether threading is on. Unset means enabled.
    #[serde(default)]
    pub enabled: Toggle,
    /// Seconds a firing message is remembered.
    #[serde(default = "default_thread_ttl")]
    pub ttl_secs: u64,
}

const fn default_thread_ttl() -> u64 {
    DEFAULT_THREAD_TTL_SECS
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            enabled: Toggle::Unspecified,
            ttl_secs: DEFAULT_THREAD_TTL_SECS,
        }
    }
}

/// Configuration for a Slack destination.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackDestinationConfig {
    /// Unique destination name.
    pub name: String,
    /// Bot token. Environment indirection is resolved before this point.
    #[serde(default)]
    pub api_key: String,
    /// Channel name or ID.
    #[serde(default)]
    pub slack_channel: String,
    /// Grouping interval in seconds. Must not be negative.
    #[serde(default)]
    pub grouping_interval: i64,
    /// Whether Slack unfurls links. Unset means enabled.
    #[serde(default)]
    pub unfurl_links: Toggle,
    /// Reply threading. Off when absent.
    #[serde(default)]
    pub threading: Option<ThreadingConfig>,
}

// Keeps the token out of logs.
impl fmt::Debug for SlackDestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackDestinationConfig")
            .field("name", &self.name)
            .field("api_key", &"<redacted>")
            .field("slack_channel", &self.slack_channel)
            .field("grouping_interval", &self.grouping_interval)
            .field("unfurl_links", &self.unfurl_links)
            .field("threading", &self.threading)
            .finish()
    }
}

impl SlackDestinationConfig {
    /// Creates a config with defaults for the optional fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        slack_channel: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            slack_channel: slack_channel.into(),
            grouping_interval: 0,
            unfurl_links: Toggle::Unspecified,
            threading: None,
        }
    }

    /// Enables reply threading with the given TTL.
    #[must_use]
    pub fn with_threading(mut self, ttl: Duration) -> Self {
        self.threading = Some(ThreadingConfig {
            enabled: Toggle::Enabled,
            ttl_secs: ttl.as_secs(),
        });
        self
    }

    /// Checks required fields and ranges.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the destination and the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = |field| ConfigError::MissingField {
            kind: KIND,
            destination: self.name.clone(),
            field,
        };

        if self.name.is_empty() {
            return Err(missing("name"));
        }
        if self.api_key.is_empty() {
            return Err(missing("api_key"));
        }
        if self.slack_channel.is_empty() {
            return Err(missing("slack_channel"));
        }
        if self.grouping_interval < 0 {
            return Err(ConfigError::InvalidField {
                kind: KIND,
                destination: self.name.clone(),
                field: "grouping_interval",
                reason: format!("must not be negative, got {}", self.grouping_interval),
            });
        }
        Ok(())
    }

    /// Grouping interval as a duration.
    #[must_use]
    pub fn grouping_interval(&self) -> Duration {
        Duration::from_secs(self.grouping_interval.unsigned_abs())
    }

    fn thread_ttl(&self) -> Option<Duration> {
        self.threading
            .as_ref()
            .filter(|t| t.enabled.is_enabled())
            .map(|t| Duration::from_secs(t.ttl_secs))
    }
}

/// Remembers the message timestamp of firing notifications by fingerprint.
#[derive(Debug, Default)]
struct ThreadCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl ThreadCache {
    /// Thread of the first fingerprint that has a live entry.
    fn find<'a>(
        &self,
        mut fingerprints: impl Iterator<Item = &'a str>,
        ttl: Duration,
    ) -> Option<String> {
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, at)| at.elapsed() < ttl);
        fingerprints.find_map(|fp| entries.get(fp).map(|(ts, _)| ts.clone()))
    }

    fn remember<'a>(&self, fingerprints: impl Iterator<Item = &'a str>, ts: &str, ttl: Duration) {
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, at)| at.elapsed() < ttl);
        let now = Instant::now();
        for fp in fingerprints {
            entries.insert(fp.to_string(), (ts.to_string(), now));
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Posts notifications to a Slack channel.
#[derive(Debug)]
pub struct SlackDestination {
    config: SlackDestinationConfig,
    client: reqwest::Client,
    api_base: String,
    threads: ThreadCache,
}

impl SlackDestination {
    /// Creates a destination. The config is assumed valid.
    #[must_use]
    pub fn new(config: SlackDestinationConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            threads: ThreadCache::default(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SlackDestinationConfig {
        &self.config
    }

    fn message<'a>(
        &'a self,
        notification: &'a Notification,
        thread_ts: Option<String>,
    ) -> SlackMessage<'a> {
        let unfurl = self.config.unfurl_links.is_enabled();
        SlackMessage {
            channel: &self.config.slack_channel,
            text: &notification.text,
            mrkdwn: true,
            unfurl_links: unfurl,
            unfurl_media: unfurl,
            thread_ts,
        }
    }

    async fn post(&self, message: &SlackMessage<'_>) -> Result<SlackResponse, DestinationError> {
        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.config.api_key)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_utf8(&mut body, MAX_ERROR_BODY);
            warn!(
                destination = %self.config.name,
                status = %status,
                "slack request failed"
            );
            return Err(DestinationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: SlackResponse = response.json().await?;
        if !body.ok {
            return Err(DestinationError::Api {
                reason: body.error.unwrap_or_else(|| "unknown_error".to_string()),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl Destination for SlackDestination {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn send(
        &self,
        cancel: &CancellationToken,
        notification: &Notification,
    ) -> Result<(), DestinationError> {
        let ttl = self.config.thread_ttl();

        // Only fully resolved notifications reply in a thread.
        let thread_ts = match ttl {
            Some(ttl) if !notification.is_firing() => self
                .threads
                .find(notification.fingerprints(IssueStatus::Resolved), ttl),
            _ => None,
        };

        let message = self.message(notification, thread_ts);
        debug!(
            destination = %self.config.name,
            channel = %self.config.slack_channel,
            threaded = message.thread_ts.is_some(),
            "sending slack message"
        );

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(DestinationError::Cancelled),
            result = self.post(&message) => result?,
        };

        if let (Some(ttl), Some(ts)) = (ttl, response.ts.as_deref()) {
            self.threads
                .remember(notification.fingerprints(IssueStatus::Firing), ts, ttl);
        }
        Ok(())
    }
}

fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    channel: &'a str,
    text: &'a str,
    mrkdwn: bool,
    unfurl_links: bool,
    unfurl_media: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}
