//! Sink that keeps notification history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use taskmarket_core::environment::Clock;
use taskmarket_core::ids::{AccountId, NotificationId};
use taskmarket_core::model::Notification;
use taskmarket_core::notify::{Alert, NotificationSink, SinkError};
use taskmarket_core::store::{MarketStore, NotificationStore, StoreError};

/// Writes every alert as a [`Notification`] row, in its own transaction.
pub struct PersistedSink {
    store: Arc<dyn MarketStore>,
    clock: Arc<dyn Clock>,
}

impl PersistedSink {
    /// Sink name used for registration and metrics.
    pub const NAME: &'static str = "persisted";

    /// Creates a sink writing into `store`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn persist(&self, alert: &Alert) -> Result<(), StoreError> {
        let notification = Notification {
            id: NotificationId::new(),
            account: alert.account,
            title: alert.title.clone(),
            content: alert.content.clone(),
            created_at: self.clock.now(),
        };
        let mut tx = self.store.begin().await?;
        tx.insert_notification(&notification).await?;
        tx.commit().await
    }

    /// Notification history of an account, newest first, optionally only
    /// those strictly after `after`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on persistence failure.
    pub async fn history(
        &self,
        account: AccountId,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut tx = self.store.begin().await?;
        tx.notifications_for(account, after).await
    }
}

#[async_trait]
impl NotificationSink for PersistedSink {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn notify(&self, alert: &Alert) -> Result<(), SinkError> {
        self.persist(alert)
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))
    }
}
