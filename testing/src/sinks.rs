//! Notification sink doubles.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskmarket_core::notify::{Alert, NotificationSink, SinkError};

/// Records every alert it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    received: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts received so far, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<Alert> {
        self.received
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, alert: &Alert) -> Result<(), SinkError> {
        if let Ok(mut alerts) = self.received.lock() {
            alerts.push(alert.clone());
        }
        Ok(())
    }
}

/// Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn notify(&self, _alert: &Alert) -> Result<(), SinkError> {
        Err(SinkError::Delivery("sink is down".to_string()))
    }
}

/// Never answers within any reasonable timeout.
#[derive(Debug, Clone, Copy)]
pub struct StallingSink {
    stall: Duration,
}

impl StallingSink {
    /// Sink that sleeps for `stall` before succeeding.
    #[must_use]
    pub const fn new(stall: Duration) -> Self {
        Self { stall }
    }
}

impl Default for StallingSink {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

#[async_trait]
impl NotificationSink for StallingSink {
    fn name(&self) -> &'static str {
        "stalling"
    }

    async fn notify(&self, _alert: &Alert) -> Result<(), SinkError> {
        tokio::time::sleep(self.stall).await;
        Ok(())
    }
}
