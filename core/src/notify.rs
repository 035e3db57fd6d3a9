//! Notification sink collaborator.
//!
//! A sink is one observer of the notification fan-out: it receives every alert
//! and delivers it its own way (persisted history, email, ...).

use crate::ids::AccountId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One alert to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Recipient account
    pub account: AccountId,
    /// Short title
    pub title: String,
    /// Plain-text body
    pub content: String,
    /// Optional formatted (HTML) body
    pub html_content: Option<String>,
}

impl Alert {
    /// Creates a plain-text alert.
    #[must_use]
    pub fn new(account: AccountId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            account,
            title: title.into(),
            content: content.into(),
            html_content: None,
        }
    }

    /// Attaches a formatted body.
    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html_content = Some(html.into());
        self
    }
}

/// Delivery failure reported by one sink. Never reaches business callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The recipient could not be resolved
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(AccountId),

    /// The sink's backend rejected or failed the delivery
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Observer registered with the notification fan-out.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Stable name used for registration, logs and metrics.
    fn name(&self) -> &'static str;

    /// Deliver one alert.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if delivery failed. The fan-out logs it and
    /// carries on.
    async fn notify(&self, alert: &Alert) -> Result<(), SinkError>;
}
