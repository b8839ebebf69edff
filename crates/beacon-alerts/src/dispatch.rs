//! Delivery of issues to a team's destinations.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::destination::{Destination, DestinationRegistry};
use crate::error::{DeliveryFailure, DispatchError};
use crate::issue::Issue;
use crate::metrics::{MetricsRecorder, NoopMetrics};
use crate::notification::Notification;
use crate::team::Team;

/// What a successful dispatch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No team was resolved; nothing was sent.
    NoTeam,
    /// The team has no destinations; nothing was sent.
    NoDestinations {
        /// The resolved team.
        team: String,
    },
    /// Every destination accepted the notification.
    Delivered {
        /// The resolved team.
        team: String,
        /// Destinations reached, in send order.
        destinations: Vec<String>,
    },
}

/// Sends notifications to every destination of a team.
///
/// Sends are sequential and fail-slow: a failed destination never stops the
/// ones after it. Failures are collected into one [`DispatchError::Delivery`].
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    registry: Arc<DestinationRegistry>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl AlertDispatcher {
    /// Creates a dispatcher over the given registry.
    #[must_use]
    pub fn new(registry: Arc<DestinationRegistry>) -> Self {
        Self {
            registry,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Records per-destination metrics to the given recorder.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<DestinationRegistry> {
        &self.registry
    }

    /// Dispatches the issues to every destination of `team`.
    ///
    /// The notification is rendered once. The cancellation token is handed to
    /// each send; the dispatcher itself does not check it between sends.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Lookup`] if any destination name is unknown
    /// (nothing is sent), or [`DispatchError::Delivery`] if at least one send
    /// failed. Successful sends are not rolled back.
    pub async fn dispatch(
        &self,
        cancel: &CancellationToken,
        issues: &[Issue],
        team: Option<&Team>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(team) = team else {
            info!(issues = issues.len(), "no team resolved, skipping dispatch");
            return Ok(DispatchOutcome::NoTeam);
        };

        if team.destinations.is_empty() {
            info!(team = %team.name, "team has no destinations, skipping dispatch");
            return Ok(DispatchOutcome::NoDestinations {
                team: team.name.clone(),
            });
        }

        let destinations =
            self.registry
                .get_many(&team.destinations)
                .map_err(|source| DispatchError::Lookup {
                    team: team.name.clone(),
                    source,
                })?;

        let notification = Notification::from_issues(issues);
        let mut delivered = Vec::with_capacity(destinations.len());
        let mut failures = Vec::new();

        for destination in destinations {
            let name = destination.name().to_string();
            let kind = destination.kind();
            let started = Instant::now();

            let result = destination.send(cancel, &notification).await;
            self.metrics
                .observe_send_duration(&name, kind, started.elapsed().as_secs_f64());

            match result {
                Ok(()) => {
                    info!(team = %team.name, destination = %name, "notification sent");
                    self.metrics.destination_sent(&name, kind);
                    delivered.push(name);
                }
                Err(e) => {
                    error!(team = %team.name, destination = %name, error = %e, "notification failed");
                    self.metrics.destination_failed(&name, kind);
                    failures.push(DeliveryFailure {
                        destination: name,
                        error: e,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(DispatchOutcome::Delivered {
                team: team.name.clone(),
                destinations: delivered,
            })
        } else {
            Err(DispatchError::Delivery {
                failures,
                delivered,
            })
        }
    }
}
