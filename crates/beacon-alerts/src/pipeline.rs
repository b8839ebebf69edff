//! End-to-end processing of one webhook event.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::convert::IssueConverter;
use crate::dispatch::{AlertDispatcher, DispatchOutcome};
use crate::error::PipelineError;
use crate::event::{validate, AlertEvent, RawAlertEvent};
use crate::issue::Issue;
use crate::metrics::{MetricsRecorder, NoopMetrics, Outcome};
use crate::team::TeamResolver;

/// Result of a successfully processed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Issues built from the event, in alert order.
    pub issues: Vec<Issue>,
    /// What the dispatcher did with them.
    pub dispatch: DispatchOutcome,
}

impl ProcessOutcome {
    /// Returns the outcome as recorded in metrics.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self.dispatch {
            DispatchOutcome::NoTeam => Outcome::NoTeamResolved,
            DispatchOutcome::NoDestinations { .. } => Outcome::NoDestinations,
            DispatchOutcome::Delivered { .. } => Outcome::Processed,
        }
    }
}

/// Validates, converts, routes and dispatches webhook events.
///
/// Every collaborator is injected; the pipeline holds no mutable state of its
/// own and can be shared across concurrent requests.
#[derive(Debug, Clone)]
pub struct AlertPipeline {
    converter: IssueConverter,
    resolver: TeamResolver,
    dispatcher: AlertDispatcher,
    metrics: Arc<dyn MetricsRecorder>,
}

impl AlertPipeline {
    /// Creates a pipeline that records no metrics.
    #[must_use]
    pub fn new(converter: IssueConverter, resolver: TeamResolver, dispatcher: AlertDispatcher) -> Self {
        Self {
            converter,
            resolver,
            dispatcher,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Records event-level metrics to the given recorder.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the team resolver.
    #[must_use]
    pub const fn resolver(&self) -> &TeamResolver {
        &self.resolver
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    /// Validates a raw event and processes it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for a malformed event, otherwise
    /// whatever [`process_event`](Self::process_event) returns.
    pub async fn process(
        &self,
        cancel: &CancellationToken,
        raw: RawAlertEvent,
    ) -> Result<ProcessOutcome, PipelineError> {
        let event = validate(raw).map_err(|e| {
            error!(error = %e, "invalid alert event");
            self.metrics.alert_failed("unknown", "validation_failed");
            PipelineError::from(e)
        })?;
        self.process_event(cancel, &event).await
    }

    /// Processes an already validated event.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Conversion`] if no issue could be built and
    /// [`PipelineError::Dispatch`] if delivery failed.
    pub async fn process_event(
        &self,
        cancel: &CancellationToken,
        event: &AlertEvent,
    ) -> Result<ProcessOutcome, PipelineError> {
        let alert_name = event.alert_name();
        self.metrics.alert_received(&event.receiver, &event.status);
        debug!(
            receiver = %event.receiver,
            status = %event.status,
            alerts = event.alerts.len(),
            "processing alert event"
        );

        let result = self.run(cancel, event).await;
        match &result {
            Ok(outcome) => {
                self.metrics
                    .alert_processed(alert_name, event.severity_label(), outcome.outcome());
                info!(
                    alert = alert_name,
                    issues = outcome.issues.len(),
                    outcome = outcome.outcome().as_str(),
                    "alert event processed"
                );
            }
            Err(e) => {
                self.metrics.alert_failed(alert_name, e.reason());
                error!(alert = alert_name, error = %e, "alert event failed");
            }
        }
        result
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        event: &AlertEvent,
    ) -> Result<ProcessOutcome, PipelineError> {
        let issues = self.converter.convert(event)?;
        let team = self.resolver.resolve(event);
        let dispatch = self.dispatcher.dispatch(cancel, &issues, team).await?;
        Ok(ProcessOutcome { issues, dispatch })
    }
}
