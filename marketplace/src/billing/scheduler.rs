//! Midnight renewal sweep for premium subscriptions.
//!
//! Each tick does two things:
//!
//! 1. **Bulk expiry**: one set-based update clears premium on every provider
//!    whose subscription was deactivated and whose last charge is more than a
//!    month old.
//! 2. **Renewal**: every active subscription last charged more than a month
//!    ago is processed in its own transaction. The provider is re-read under
//!    lock and reset to non-premium, then restored only if the debit of the
//!    current price succeeds. No method, or a declined debit, leaves it
//!    cancelled. Any other failure rolls that provider back untouched for the
//!    next run.
//!
//! [`SubscriptionBillingScheduler::run`] sweeps once, then sleeps until the
//! next UTC midnight of the injected clock, recomputing the wait after every
//! sweep so drift does not accumulate.

use super::pricing::PremiumPricing;
use super::renewal_cutoff;
use crate::abort;
use crate::error::{Entity, MarketError, Result};
use crate::ledger::PaymentLedger;
use crate::messages;
use crate::notifications::NotificationFanout;
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use taskmarket_core::environment::Clock;
use taskmarket_core::ids::{AccountId, ProviderId};
use taskmarket_core::store::{MarketStore, PaymentMethodStore, ProfileStore};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Lapsed subscriptions cleared by the bulk update
    pub expired: u64,
    /// Subscriptions charged and extended
    pub renewed: usize,
    /// Subscriptions cancelled for lack of a working payment method
    pub cancelled: usize,
    /// Providers left untouched after an unexpected failure
    pub failed: usize,
    /// The sweep stopped early on shutdown
    pub interrupted: bool,
}

enum Renewal {
    Renewed(AccountId),
    Cancelled(AccountId),
    Skipped,
}

/// Background renewal of premium subscriptions.
pub struct SubscriptionBillingScheduler {
    store: Arc<dyn MarketStore>,
    ledger: Arc<PaymentLedger>,
    fanout: Arc<NotificationFanout>,
    clock: Arc<dyn Clock>,
    pricing: Arc<PremiumPricing>,
}

impl SubscriptionBillingScheduler {
    /// Creates a scheduler charging according to `pricing`.
    #[must_use]
    pub fn new(
        store: Arc<dyn MarketStore>,
        ledger: Arc<PaymentLedger>,
        fanout: Arc<NotificationFanout>,
        clock: Arc<dyn Clock>,
        pricing: Arc<PremiumPricing>,
    ) -> Self {
        Self {
            store,
            ledger,
            fanout,
            clock,
            pricing,
        }
    }

    /// Sweep once and return what happened.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Store`] if the bulk expiry or the listing of due
    /// providers fails. Per-provider failures are counted, not returned.
    pub async fn run_once(&self) -> Result<SweepReport> {
        self.sweep(None).await
    }

    /// Sweep now, then at every UTC midnight until `shutdown` fires (or its
    /// sender is dropped).
    ///
    /// A sweep in progress finishes its current provider before stopping.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!("Subscription billing scheduler started");
        loop {
            match self.sweep(Some(&mut shutdown)).await {
                Ok(report) if report.interrupted => {
                    info!(?report, "Subscription sweep interrupted by shutdown");
                    break;
                }
                Ok(report) => info!(?report, "Subscription sweep finished"),
                Err(e) => error!(error = %e, "Subscription sweep failed"),
            }

            let wait = duration_until_next_midnight(self.clock.now());
            debug!(wait_secs = wait.as_secs(), "Next subscription sweep scheduled");

            tokio::select! {
                _ = shutdown.recv() => break,
                () = tokio::time::sleep(wait) => {}
            }
        }
        info!("Subscription billing scheduler stopped");
    }

    async fn sweep(
        &self,
        mut shutdown: Option<&mut broadcast::Receiver<()>>,
    ) -> Result<SweepReport> {
        let now = self.clock.now();
        let cutoff = renewal_cutoff(now);
        let mut report = SweepReport::default();

        let due = {
            let mut tx = self.store.begin().await?;
            report.expired = tx.expire_lapsed_subscriptions(cutoff).await?;
            let due = tx.providers_due_for_renewal(cutoff).await?;
            tx.commit().await?;
            due
        };
        if report.expired > 0 {
            info!(expired = report.expired, "Lapsed premium subscriptions expired");
            metrics::counter!("billing.expired").increment(report.expired);
        }

        for provider in due {
            if let Some(rx) = shutdown.as_deref_mut() {
                if !matches!(rx.try_recv(), Err(TryRecvError::Empty)) {
                    report.interrupted = true;
                    break;
                }
            }

            match self.renew(provider, cutoff, now).await {
                Ok(Renewal::Renewed(account)) => {
                    report.renewed += 1;
                    metrics::counter!("billing.renewals", "outcome" => "renewed").increment(1);
                    self.fanout
                        .send(messages::subscription_extended(account))
                        .await;
                }
                Ok(Renewal::Cancelled(account)) => {
                    report.cancelled += 1;
                    metrics::counter!("billing.renewals", "outcome" => "cancelled").increment(1);
                    self.fanout
                        .send(messages::subscription_cancelled(account))
                        .await;
                }
                Ok(Renewal::Skipped) => {
                    debug!(provider_id = %provider, "Provider no longer due for renewal");
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::counter!("billing.renewals", "outcome" => "failed").increment(1);
                    error!(provider_id = %provider, error = %e, "Subscription renewal failed");
                }
            }
        }

        Ok(report)
    }

    async fn renew(
        &self,
        provider: ProviderId,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Renewal> {
        let mut tx = self.store.begin().await?;
        let Some(mut subscriber) = tx.provider_for_update(provider).await? else {
            return Ok(Renewal::Skipped);
        };
        let due = subscriber.is_subscription_active
            && subscriber.subscription_date.is_some_and(|date| date < cutoff);
        if !due {
            return Ok(Renewal::Skipped);
        }

        subscriber.cancel_subscription();

        let Some(method) = tx.methods_for(subscriber.account).await?.into_iter().next() else {
            tx.update_provider(&subscriber).await?;
            tx.commit().await?;
            info!(provider_id = %provider, "Premium cancelled: no payment method");
            return Ok(Renewal::Cancelled(subscriber.account));
        };

        let account = tx
            .account(subscriber.account)
            .await?
            .ok_or(MarketError::NotFound(Entity::Account))?;
        let price = self.pricing.price_for(&account);

        match self
            .ledger
            .execute_in(tx.as_mut(), Some(method.id), None, price)
            .await
        {
            Ok(_) => {
                subscriber.renew_subscription(now);
                tx.update_provider(&subscriber).await?;
                tx.commit().await?;
                info!(provider_id = %provider, amount = price.cents(), "Premium renewed");
                Ok(Renewal::Renewed(subscriber.account))
            }
            Err(MarketError::PaymentFailure(reason)) => {
                tx.update_provider(&subscriber).await?;
                tx.commit().await?;
                warn!(
                    provider_id = %provider,
                    reason = %reason,
                    "Premium cancelled: renewal declined"
                );
                Ok(Renewal::Cancelled(subscriber.account))
            }
            Err(e) => {
                abort(tx).await;
                Err(e)
            }
        }
    }
}

/// Time from `now` to the next UTC midnight.
#[must_use]
pub fn duration_until_next_midnight(now: DateTime<Utc>) -> Duration {
    now.date_naive()
        .succ_opt()
        .map(|tomorrow| tomorrow.and_time(NaiveTime::MIN).and_utc())
        .and_then(|midnight| (midnight - now).to_std().ok())
        .unwrap_or(Duration::from_secs(24 * 60 * 60))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn waits_until_next_midnight() {
        assert_eq!(
            duration_until_next_midnight(at("2025-07-15T12:00:00Z")),
            Duration::from_secs(12 * 3600)
        );
        assert_eq!(
            duration_until_next_midnight(at("2025-07-15T23:59:59Z")),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn exactly_midnight_waits_a_full_day() {
        assert_eq!(
            duration_until_next_midnight(at("2025-12-31T00:00:00Z")),
            Duration::from_secs(24 * 3600)
        );
    }
}
