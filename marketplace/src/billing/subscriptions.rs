//! Interactive premium activation and deactivation.

use super::pricing::PremiumPricing;
use super::renewal_cutoff;
use crate::abort;
use crate::error::{ConflictReason, Entity, MarketError, Result, ValidationReason};
use crate::ledger::PaymentLedger;
use crate::messages;
use crate::notifications::NotificationFanout;
use std::sync::Arc;
use taskmarket_core::environment::Clock;
use taskmarket_core::ids::{PaymentMethodId, ProviderId};
use taskmarket_core::model::{PaymentMethod, Provider};
use taskmarket_core::store::{MarketStore, PaymentMethodStore, ProfileStore, StoreTransaction};
use tracing::{info, warn};

/// Provider-facing premium toggles.
///
/// Both operations hold the provider row lock from the first read to the
/// commit, so they serialize with each other and with the renewal sweep.
pub struct SubscriptionService {
    store: Arc<dyn MarketStore>,
    ledger: Arc<PaymentLedger>,
    fanout: Arc<NotificationFanout>,
    clock: Arc<dyn Clock>,
    pricing: Arc<PremiumPricing>,
}

impl SubscriptionService {
    /// Creates the service charging according to `pricing`.
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

    /// Turn on automatic renewal.
    ///
    /// A provider still inside a paid period (deactivated, not yet expired)
    /// is re-activated without a charge. Otherwise the first month is
    /// debited from `method`, or from the provider's default method, before
    /// any flag is written.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the provider or `method` does not exist
    /// - [`MarketError::Conflict`] if the subscription is already active
    /// - [`MarketError::Validation`] if `method` belongs to someone else
    /// - [`MarketError::NoPaymentMethod`] if no method is given and none is
    ///   registered
    /// - [`MarketError::PaymentFailure`] if the debit fails; nothing changes
    pub async fn activate_premium(
        &self,
        provider: ProviderId,
        method: Option<PaymentMethodId>,
    ) -> Result<Provider> {
        let mut tx = self.store.begin().await?;
        let mut subscriber = tx
            .provider_for_update(provider)
            .await?
            .ok_or(MarketError::NotFound(Entity::Provider))?;
        if subscriber.is_subscription_active {
            return Err(ConflictReason::PremiumAlreadyActive.into());
        }

        let funding = funding_method(tx.as_mut(), &subscriber, method).await?;

        let now = self.clock.now();
        if subscriber.is_within_paid_period(renewal_cutoff(now)) {
            subscriber.is_subscription_active = true;
            tx.update_provider(&subscriber).await?;
            tx.commit().await?;
            info!(provider_id = %provider, "Premium subscription resumed within paid period");
        } else {
            let account = tx
                .account(subscriber.account)
                .await?
                .ok_or(MarketError::NotFound(Entity::Account))?;
            let price = self.pricing.price_for(&account);

            if let Err(e) = self
                .ledger
                .execute_in(tx.as_mut(), Some(funding.id), None, price)
                .await
            {
                abort(tx).await;
                warn!(provider_id = %provider, error = %e, "Premium activation charge failed");
                return Err(e);
            }

            subscriber.renew_subscription(now);
            tx.update_provider(&subscriber).await?;
            tx.commit().await?;
            info!(
                provider_id = %provider,
                amount = price.cents(),
                "Premium subscription activated"
            );
        }

        self.fanout
            .send(messages::subscription_activated(subscriber.account))
            .await;
        Ok(subscriber)
    }

    /// Turn off automatic renewal. Benefits remain until the paid period
    /// ends and the scheduler expires them.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the provider does not exist
    /// - [`MarketError::Conflict`] if the subscription is not active
    pub async fn deactivate_premium(&self, provider: ProviderId) -> Result<Provider> {
        let mut tx = self.store.begin().await?;
        let mut subscriber = tx
            .provider_for_update(provider)
            .await?
            .ok_or(MarketError::NotFound(Entity::Provider))?;
        if !subscriber.is_subscription_active {
            return Err(ConflictReason::PremiumNotActive.into());
        }

        subscriber.is_subscription_active = false;
        tx.update_provider(&subscriber).await?;
        tx.commit().await?;

        info!(provider_id = %provider, "Premium subscription deactivated");
        self.fanout
            .send(messages::subscription_deactivated(subscriber.account))
            .await;
        Ok(subscriber)
    }
}

async fn funding_method(
    tx: &mut dyn StoreTransaction,
    provider: &Provider,
    method: Option<PaymentMethodId>,
) -> Result<PaymentMethod> {
    match method {
        Some(id) => {
            let method = tx
                .method(id)
                .await?
                .ok_or(MarketError::NotFound(Entity::PaymentMethod))?;
            if method.account == provider.account {
                Ok(method)
            } else {
                Err(ValidationReason::ForeignPaymentMethod.into())
            }
        }
        None => tx
            .methods_for(provider.account)
            .await?
            .into_iter()
            .next()
            .ok_or(MarketError::NoPaymentMethod),
    }
}
