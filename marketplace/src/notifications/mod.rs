//! Best-effort notification fan-out.
//!
//! [`NotificationFanout`] keeps a registry of [`NotificationSink`]s. Sending an
//! alert invokes every registered sink concurrently, each on its own task and
//! under its own timeout, and waits for all of them. A sink that fails, stalls
//! or panics is logged and counted; it never affects its siblings and never
//! reaches the caller.
//!
//! Business operations only send after their transaction has committed.

pub mod email;
pub mod persisted;

use futures::future::join_all;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use taskmarket_core::ids::AccountId;
use taskmarket_core::notify::{Alert, NotificationSink};
use tracing::{debug, info, warn};

pub use email::{ConsoleEmailTransport, EmailMessage, EmailSink, EmailTransport};
pub use persisted::PersistedSink;

/// Outcome of one broadcast, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sinks that confirmed delivery
    pub delivered: usize,
    /// Sinks that failed, timed out or panicked
    pub failed: usize,
}

/// Registry of notification sinks.
pub struct NotificationFanout {
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
    sink_timeout: Duration,
}

impl NotificationFanout {
    /// Creates an empty fan-out bounding each sink call by `sink_timeout`.
    #[must_use]
    pub fn new(sink_timeout: Duration) -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
            sink_timeout,
        }
    }

    /// Adds a sink. A sink with the same name is replaced.
    pub fn register(&self, sink: Arc<dyn NotificationSink>) {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        sinks.retain(|existing| existing.name() != sink.name());
        info!(sink = sink.name(), "Notification sink registered");
        sinks.push(sink);
    }

    /// Removes the sink called `name`. Returns whether one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        let before = sinks.len();
        sinks.retain(|sink| sink.name() != name);
        before != sinks.len()
    }

    /// Names of the registered sinks, in registration order.
    #[must_use]
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.snapshot().iter().map(|sink| sink.name()).collect()
    }

    fn snapshot(&self) -> Vec<Arc<dyn NotificationSink>> {
        self.sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Broadcast one alert built from its parts.
    pub async fn send_notification(
        &self,
        account: AccountId,
        title: &str,
        content: &str,
        html_content: Option<String>,
    ) -> DeliveryReport {
        let mut alert = Alert::new(account, title, content);
        alert.html_content = html_content;
        self.send(alert).await
    }

    /// Broadcast `alert` to every registered sink and wait for all of them.
    pub async fn send(&self, alert: Alert) -> DeliveryReport {
        let sinks = self.snapshot();
        let alert = Arc::new(alert);

        let handles: Vec<_> = sinks
            .into_iter()
            .map(|sink| {
                let alert = Arc::clone(&alert);
                let timeout = self.sink_timeout;
                let name = sink.name();
                let handle = tokio::spawn(async move {
                    tokio::time::timeout(timeout, sink.notify(&alert)).await
                });
                (name, handle)
            })
            .collect();

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let outcomes = join_all(handles).await;

        let mut report = DeliveryReport::default();
        for (name, outcome) in names.into_iter().zip(outcomes) {
            let failure = match outcome {
                Ok(Ok(Ok(()))) => None,
                Ok(Ok(Err(e))) => Some(e.to_string()),
                Ok(Err(_)) => Some(format!("timed out after {:?}", self.sink_timeout)),
                Err(e) => Some(format!("sink task aborted: {e}")),
            };
            match failure {
                None => {
                    report.delivered += 1;
                    metrics::counter!("notifications.delivered", "sink" => name).increment(1);
                }
                Some(error) => {
                    report.failed += 1;
                    warn!(
                        sink = name,
                        account_id = %alert.account,
                        title = %alert.title,
                        error = %error,
                        "Notification delivery failed"
                    );
                    metrics::counter!("notifications.failed", "sink" => name).increment(1);
                }
            }
        }

        debug!(
            account_id = %alert.account,
            delivered = report.delivered,
            failed = report.failed,
            "Notification fanned out"
        );
        report
    }
}
