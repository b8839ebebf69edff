//! Notification destinations.
//!
//! This module provides the [`Destination`] trait, the closed set of
//! [`DestinationConfig`] variants, the [`DestinationFactory`] that builds a
//! destination from its configuration, and the [`DestinationRegistry`] that
//! owns every built destination by name.

mod registry;
pub mod slack;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, DestinationError};
use crate::notification::Notification;

pub use registry::DestinationRegistry;
pub use slack::{SlackDestination, SlackDestinationConfig, ThreadingConfig};

/// A named endpoint that accepts notifications.
///
/// Implementations must honor the cancellation token for the duration of a
/// single send. They are not expected to retry.
#[async_trait]
pub trait Destination: Send + Sync + fmt::Debug {
    /// Returns the configured name of this destination.
    fn name(&self) -> &str;

    /// Returns the destination kind, e.g. `slack`.
    fn kind(&self) -> &'static str;

    /// Delivers a notification.
    ///
    /// # Errors
    ///
    /// Returns a [`DestinationError`] if the endpoint could not be reached,
    /// rejected the message, or the token was cancelled first.
    async fn send(
        &self,
        cancel: &CancellationToken,
        notification: &Notification,
    ) -> Result<(), DestinationError>;
}

/// Configuration for one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationConfig {
    /// A Slack channel reached through the Web API.
    Slack(SlackDestinationConfig),
}

impl DestinationConfig {
    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Slack(config) => &config.name,
        }
    }

    /// Returns the destination kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Slack(_) => slack::KIND,
        }
    }
}

/// Destination declarations grouped by kind, as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationSet {
    /// Slack destinations.
    #[serde(default)]
    pub slack: Vec<SlackDestinationConfig>,
    /// Kinds this build does not know how to construct.
    #[serde(flatten)]
    pub unsupported: BTreeMap<String, serde_json::Value>,
}

/// The `destinations` configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationsConfig {
    /// Declared destinations.
    #[serde(default)]
    pub destinations: DestinationSet,
}

impl DestinationsConfig {
    /// Flattens the declarations into a list of typed configs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedDestinationType`] if the document
    /// declares a kind other than the supported ones.
    pub fn declarations(&self) -> Result<Vec<DestinationConfig>, ConfigError> {
        if let Some(kind) = self.destinations.unsupported.keys().next() {
            return Err(ConfigError::UnsupportedDestinationType { kind: kind.clone() });
        }

        Ok(self
            .destinations
            .slack
            .iter()
            .cloned()
            .map(DestinationConfig::Slack)
            .collect())
    }
}

/// Builds destinations from their configuration.
#[derive(Debug, Clone, Default)]
pub struct DestinationFactory {
    client: reqwest::Client,
    slack_api_base: Option<String>,
}

impl DestinationFactory {
    /// Creates a factory with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given HTTP client for every destination built.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Overrides the Slack Web API base URL.
    #[must_use]
    pub fn with_slack_api_base(mut self, base: impl Into<String>) -> Self {
        self.slack_api_base = Some(base.into());
        self
    }

    /// Builds a destination.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if required fields are missing or invalid.
    pub fn create(&self, config: &DestinationConfig) -> Result<Arc<dyn Destination>, ConfigError> {
        match config {
            DestinationConfig::Slack(slack) => {
                slack.validate()?;
                let mut destination = SlackDestination::new(slack.clone(), self.client.clone());
                if let Some(base) = &self.slack_api_base {
                    destination = destination.with_api_base(base.clone());
                }
                Ok(Arc::new(destination))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slack(name: &str, api_key: &str) -> SlackDestinationConfig {
        SlackDestinationConfig::new(name, api_key, "#alerts")
    }

    mod config_tests {
        use super::*;

        #[test]
        fn declarations_from_json() {
            let config: DestinationsConfig = serde_json::from_str(
                r##"{"destinations":{"slack":[
                    {"name":"ops","api_key":"xoxb-1","slack_channel":"#ops"},
                    {"name":"sre","api_key":"xoxb-2","slack_channel":"#sre","unfurl_links":false}
                ]}}"##,
            )
            .unwrap();
            let declarations = config.declarations().unwrap();

            assert_eq!(declarations.len(), 2);
            assert_eq!(declarations[0].name(), "ops");
            assert_eq!(declarations[1].kind(), "slack");
        }

        #[test]
        fn unknown_kind_is_unsupported() {
            let config: DestinationsConfig = serde_json::from_str(
                r#"{"destinations":{"pagerduty":[{"name":"pd"}]}}"#,
            )
            .unwrap();
            assert_eq!(
                config.declarations().unwrap_err(),
                ConfigError::UnsupportedDestinationType {
                    kind: "pagerduty".to_string()
                }
            );
        }

        #[test]
        fn empty_document() {
            let config: DestinationsConfig = serde_json::from_str("{}").unwrap();
            assert!(config.declarations().unwrap().is_empty());
        }
    }

    mod factory_tests {
        use super::*;

        #[test]
        fn creates_slack_destination() {
            let destination = DestinationFactory::new()
                .create(&DestinationConfig::Slack(slack("ops", "xoxb-1")))
                .unwrap();
            assert_eq!(destination.name(), "ops");
            assert_eq!(destination.kind(), "slack");
        }

        #[test]
        fn missing_api_key_names_destination() {
            let err = DestinationFactory::new()
                .create(&DestinationConfig::Slack(slack("ops", "")))
                .unwrap_err();
            assert_eq!(err.to_string(), "slack destination 'ops' must have api_key");
        }
    }
}
