//! Application wiring.
//!
//! [`Marketplace`] builds every component around one store, one clock and one
//! pricing policy, so the interactive subscription path and the scheduler can
//! never charge differently.

use crate::billing::{PremiumPricing, SubscriptionBillingScheduler, SubscriptionService};
use crate::config::Config;
use crate::error::Result;
use crate::ledger::PaymentLedger;
use crate::lifecycle::RequestLifecycleEngine;
use crate::notifications::{
    ConsoleEmailTransport, EmailSink, EmailTransport, NotificationFanout, PersistedSink,
};
use crate::reviews::ReviewService;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use taskmarket_core::environment::Clock;
use taskmarket_core::ids::AccountId;
use taskmarket_core::model::Notification;
use taskmarket_core::payment::PaymentProcessor;
use taskmarket_core::store::MarketStore;

/// Every marketplace component, wired together.
pub struct Marketplace {
    /// Money movements and payment methods
    pub ledger: Arc<PaymentLedger>,
    /// Notification broadcast
    pub fanout: Arc<NotificationFanout>,
    /// Request and offer commands
    pub lifecycle: Arc<RequestLifecycleEngine>,
    /// Reviews of completed requests
    pub reviews: Arc<ReviewService>,
    /// Interactive premium toggles
    pub subscriptions: Arc<SubscriptionService>,
    /// Nightly renewal sweep
    pub scheduler: Arc<SubscriptionBillingScheduler>,
    /// Shared pricing policy
    pub pricing: Arc<PremiumPricing>,
    history: Arc<PersistedSink>,
}

impl Marketplace {
    /// Wire the marketplace with emails printed to the log.
    #[must_use]
    pub fn new(
        store: Arc<dyn MarketStore>,
        processor: Arc<dyn PaymentProcessor>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self::with_email_transport(
            store,
            processor,
            clock,
            config,
            Arc::new(ConsoleEmailTransport),
        )
    }

    /// Wire the marketplace sending emails through `transport`.
    #[must_use]
    pub fn with_email_transport(
        store: Arc<dyn MarketStore>,
        processor: Arc<dyn PaymentProcessor>,
        clock: Arc<dyn Clock>,
        config: &Config,
        transport: Arc<dyn EmailTransport>,
    ) -> Self {
        let pricing = Arc::new(PremiumPricing::from_config(&config.billing));

        let ledger = Arc::new(PaymentLedger::new(
            Arc::clone(&store),
            processor,
            Arc::clone(&clock),
            config.payments.timeout(),
        ));

        let fanout = Arc::new(NotificationFanout::new(config.notifications.sink_timeout()));
        let history = Arc::new(PersistedSink::new(Arc::clone(&store), Arc::clone(&clock)));
        fanout.register(history.clone());
        fanout.register(Arc::new(EmailSink::new(
            Arc::clone(&store),
            transport,
            config.notifications.email_subject_prefix.clone(),
        )));

        let lifecycle = Arc::new(RequestLifecycleEngine::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&fanout),
            Arc::clone(&clock),
        ));
        let reviews = Arc::new(ReviewService::new(
            Arc::clone(&store),
            Arc::clone(&fanout),
            Arc::clone(&clock),
        ));
        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&fanout),
            Arc::clone(&clock),
            Arc::clone(&pricing),
        ));
        let scheduler = Arc::new(SubscriptionBillingScheduler::new(
            store,
            Arc::clone(&ledger),
            Arc::clone(&fanout),
            clock,
            Arc::clone(&pricing),
        ));

        Self {
            ledger,
            fanout,
            lifecycle,
            reviews,
            subscriptions,
            scheduler,
            pricing,
            history,
        }
    }

    /// Persisted notifications of an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MarketError::Store`] on persistence failure.
    pub async fn notifications_for(
        &self,
        account: AccountId,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>> {
        Ok(self.history.history(account, after).await?)
    }
}
