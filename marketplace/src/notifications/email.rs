//! Email delivery of notifications.
//!
//! [`EmailSink`] resolves the recipient's address and hands a rendered
//! message to an [`EmailTransport`]. [`ConsoleEmailTransport`] prints emails
//! to the log for development; a real SMTP or API transport implements the
//! same trait.

use async_trait::async_trait;
use std::sync::Arc;
use taskmarket_core::notify::{Alert, NotificationSink, SinkError};
use taskmarket_core::store::{MarketStore, ProfileStore};
use tracing::info;

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address
    pub to: String,
    /// Subject line, already prefixed
    pub subject: String,
    /// Plain-text body
    pub text_body: String,
    /// HTML body
    pub html_body: String,
}

/// Something that can send an email.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Send one message.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the message was not accepted.
    async fn send(&self, message: &EmailMessage) -> Result<(), SinkError>;
}

/// Console email transport (prints to the log for development)
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleEmailTransport;

#[async_trait]
impl EmailTransport for ConsoleEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), SinkError> {
        info!(
            "\n\n\
            ┌────────────────────────────────────────────────────────────────┐\n\
            │ To: {:<58} │\n\
            │ Subject: {:<53} │\n\
            ├────────────────────────────────────────────────────────────────┤\n\
            │ {}\n\
            └────────────────────────────────────────────────────────────────┘\n",
            message.to, message.subject, message.text_body
        );
        Ok(())
    }
}

/// Sends every alert as an email to the account's address.
pub struct EmailSink {
    store: Arc<dyn MarketStore>,
    transport: Arc<dyn EmailTransport>,
    subject_prefix: String,
}

impl EmailSink {
    /// Sink name used for registration and metrics.
    pub const NAME: &'static str = "email";

    /// Creates a sink prefixing subjects with `subject_prefix`.
    #[must_use]
    pub fn new(
        store: Arc<dyn MarketStore>,
        transport: Arc<dyn EmailTransport>,
        subject_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transport,
            subject_prefix: subject_prefix.into(),
        }
    }

    /// Render an alert for `to`.
    #[must_use]
    pub fn render(&self, to: &str, alert: &Alert) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: format!("{} | {}", self.subject_prefix, alert.title),
            text_body: alert.content.clone(),
            html_body: alert
                .html_content
                .clone()
                .unwrap_or_else(|| format!("<p>{}</p>", escape_html(&alert.content))),
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn notify(&self, alert: &Alert) -> Result<(), SinkError> {
        let account = {
            let mut tx = self
                .store
                .begin()
                .await
                .map_err(|e| SinkError::Delivery(e.to_string()))?;
            tx.account(alert.account)
                .await
                .map_err(|e| SinkError::Delivery(e.to_string()))?
                .ok_or(SinkError::UnknownRecipient(alert.account))?
        };

        let message = self.render(&account.email, alert);
        self.transport.send(&message).await
    }
}
