//! In-memory destinations for tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::Destination;
use crate::error::DestinationError;
use crate::notification::Notification;

/// Records every notification it receives and optionally fails each send.
#[derive(Debug, Clone)]
pub struct RecordingDestination {
    name: String,
    failure: Option<DestinationError>,
    received: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingDestination {
    /// Creates a destination that accepts everything.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure: None,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a destination that records, then fails, every send.
    #[must_use]
    pub fn failing(name: impl Into<String>, error: DestinationError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(name)
        }
    }

    /// Returns the number of sends attempted.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.received.lock().len()
    }

    /// Returns a copy of every notification received.
    #[must_use]
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl Destination for RecordingDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "recording"
    }

    async fn send(
        &self,
        _cancel: &CancellationToken,
        notification: &Notification,
    ) -> Result<(), DestinationError> {
        self.received.lock().push(notification.clone());
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
