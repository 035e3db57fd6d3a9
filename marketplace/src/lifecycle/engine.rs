//! Transactional request lifecycle.

use super::rules::{
    settlement_amount, validate_completion, validate_new_request, validate_offer,
    validate_selection,
};
use super::{Completion, RequestView};
use crate::abort;
use crate::error::{Entity, MarketError, Result};
use crate::ledger::PaymentLedger;
use crate::messages;
use crate::notifications::NotificationFanout;
use std::sync::Arc;
use taskmarket_core::environment::Clock;
use taskmarket_core::ids::{AccountId, ConsumerId, OfferId, ProviderId, RequestId};
use taskmarket_core::model::{NewRequest, Offer, PaymentMethod, Request, RequestFilter};
use taskmarket_core::money::Money;
use taskmarket_core::store::{
    MarketStore, PaymentMethodStore, ProfileStore, RequestStore, StoreTransaction,
};
use tracing::{info, warn};

/// Owns the request/offer state machine.
///
/// Every command reads what it decides on inside its transaction (locking the
/// request or consumer row), writes, commits, and only then notifies.
pub struct RequestLifecycleEngine {
    store: Arc<dyn MarketStore>,
    ledger: Arc<PaymentLedger>,
    fanout: Arc<NotificationFanout>,
    clock: Arc<dyn Clock>,
}

impl RequestLifecycleEngine {
    /// Creates an engine settling through `ledger` and notifying through
    /// `fanout`.
    #[must_use]
    pub fn new(
        store: Arc<dyn MarketStore>,
        ledger: Arc<PaymentLedger>,
        fanout: Arc<NotificationFanout>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            fanout,
            clock,
        }
    }

    /// Post a new request and count it on the consumer.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] for a blank title or zero budget
    /// - [`MarketError::NotFound`] if the consumer does not exist
    pub async fn create_request(
        &self,
        consumer: ConsumerId,
        details: NewRequest,
    ) -> Result<Request> {
        validate_new_request(&details)?;

        let mut tx = self.store.begin().await?;
        let mut profile = tx
            .consumer_for_update(consumer)
            .await?
            .ok_or(MarketError::NotFound(Entity::Consumer))?;

        let request = Request::open(consumer, details, self.clock.now());
        tx.insert_request(&request).await?;

        profile.requests_posted = profile.requests_posted.saturating_add(1);
        tx.update_consumer(&profile).await?;
        tx.commit().await?;

        info!(
            request_id = %request.id,
            consumer_id = %consumer,
            budget = request.budget.cents(),
            "Request created"
        );
        Ok(request)
    }

    /// Bid on a request, optionally at a discounted price.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the request or provider does not exist
    /// - [`MarketError::Conflict`] if the request is completed
    /// - [`MarketError::Validation`] for a price from a non-premium provider
    ///   or above budget
    pub async fn create_offer(
        &self,
        provider: ProviderId,
        request: RequestId,
        price: Option<Money>,
    ) -> Result<Offer> {
        let mut tx = self.store.begin().await?;
        let target = tx
            .request_for_update(request)
            .await?
            .ok_or(MarketError::NotFound(Entity::Request))?;
        let bidder = tx
            .provider(provider)
            .await?
            .ok_or(MarketError::NotFound(Entity::Provider))?;

        validate_offer(&bidder, &target, price)?;

        let offer = Offer {
            id: OfferId::new(),
            provider,
            request,
            price,
            created_at: self.clock.now(),
        };
        tx.insert_offer(&offer).await?;
        let consumer = consumer_account(tx.as_mut(), target.consumer).await?;
        tx.commit().await?;

        info!(
            offer_id = %offer.id,
            request_id = %request,
            provider_id = %provider,
            price = ?offer.price.map(|p| p.cents()),
            "Offer created"
        );

        if let Some(account) = consumer {
            self.fanout
                .send(messages::offer_created(account, &target.title, price))
                .await;
        }
        Ok(offer)
    }

    /// Select `offer` for `request`, replacing any previous selection.
    ///
    /// Selecting the already-selected offer writes nothing but notifies its
    /// provider again. The provider of a different previous offer is told it
    /// was unselected.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the request or offer does not exist
    /// - [`MarketError::Validation`] if the offer belongs to another request
    /// - [`MarketError::Conflict`] if the request is completed
    pub async fn select_offer(&self, request: RequestId, offer: OfferId) -> Result<Request> {
        let mut tx = self.store.begin().await?;
        let mut target = tx
            .request_for_update(request)
            .await?
            .ok_or(MarketError::NotFound(Entity::Request))?;
        let chosen = tx
            .offer(offer)
            .await?
            .ok_or(MarketError::NotFound(Entity::Offer))?;

        validate_selection(&target, &chosen)?;

        let previous = target.selected_offer.filter(|previous| *previous != offer);
        if target.selected_offer != Some(offer) {
            target.selected_offer = Some(offer);
            tx.update_request(&target).await?;
        }

        let selected_account = provider_account(tx.as_mut(), chosen.provider).await?;
        let unselected_account = match previous {
            Some(previous) => match tx.offer(previous).await? {
                Some(previous) => provider_account(tx.as_mut(), previous.provider).await?,
                None => None,
            },
            None => None,
        };
        tx.commit().await?;

        info!(
            request_id = %request,
            offer_id = %offer,
            previous_offer_id = ?previous,
            "Offer selected"
        );

        if let Some(account) = selected_account {
            self.fanout
                .send(messages::offer_selected(account, &target.title))
                .await;
        }
        if let Some(account) = unselected_account {
            self.fanout
                .send(messages::offer_unselected(account, &target.title))
                .await;
        }
        Ok(target)
    }

    /// Complete a request and settle it: mark it completed, count it on the
    /// consumer and transfer the settlement amount from the consumer's
    /// default method to the provider's, all in one transaction.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the request does not exist
    /// - [`MarketError::Conflict`] if it is already completed or has no
    ///   selected offer
    /// - [`MarketError::NoPaymentMethod`] if either party has no method
    /// - [`MarketError::PaymentFailure`] if the transfer fails; nothing is
    ///   written
    pub async fn complete_request(&self, request: RequestId) -> Result<Completion> {
        let mut tx = self.store.begin().await?;
        let mut target = tx
            .request_for_update(request)
            .await?
            .ok_or(MarketError::NotFound(Entity::Request))?;
        let offer_id = validate_completion(&target)?;

        let offer = tx
            .offer(offer_id)
            .await?
            .ok_or(MarketError::NotFound(Entity::Offer))?;
        let provider = tx
            .provider(offer.provider)
            .await?
            .ok_or(MarketError::NotFound(Entity::Provider))?;
        let mut consumer = tx
            .consumer_for_update(target.consumer)
            .await?
            .ok_or(MarketError::NotFound(Entity::Consumer))?;

        let from = default_method(tx.as_mut(), consumer.account).await?;
        let to = default_method(tx.as_mut(), provider.account).await?;
        let (Some(from), Some(to)) = (from, to) else {
            return Err(MarketError::NoPaymentMethod);
        };

        let amount = settlement_amount(&target, &offer);

        target.completed_date = Some(self.clock.now());
        tx.update_request(&target).await?;
        consumer.requests_completed = consumer.requests_completed.saturating_add(1);
        tx.update_consumer(&consumer).await?;

        let payment = match self
            .ledger
            .execute_in(tx.as_mut(), Some(from.id), Some(to.id), amount)
            .await
        {
            Ok(payment) => payment,
            Err(e) => {
                abort(tx).await;
                warn!(request_id = %request, error = %e, "Request completion rolled back");
                return Err(e);
            }
        };
        tx.commit().await?;

        info!(
            request_id = %request,
            offer_id = %offer.id,
            amount = amount.cents(),
            "Request completed"
        );

        self.fanout
            .send(messages::request_completed(consumer.account, &target.title))
            .await;
        self.fanout
            .send(messages::request_completed(provider.account, &target.title))
            .await;

        Ok(Completion {
            request: target,
            payment,
        })
    }

    /// A request with all its offers.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if the request does not exist.
    pub async fn get_request(&self, request: RequestId) -> Result<RequestView> {
        let mut tx = self.store.begin().await?;
        let found = tx
            .request(request)
            .await?
            .ok_or(MarketError::NotFound(Entity::Request))?;
        let offers = tx.offers_for(request).await?;
        Ok(RequestView {
            request: found,
            offers,
        })
    }

    /// Requests matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Store`] on persistence failure.
    pub async fn find_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.find_requests(filter).await?)
    }

    /// Every request a consumer posted, open or completed, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Store`] on persistence failure.
    pub async fn requests_posted_by(&self, consumer: ConsumerId) -> Result<Vec<Request>> {
        let mut tx = self.store.begin().await?;
        let mut requests = Vec::new();
        for completed in [false, true] {
            let filter = RequestFilter {
                completed,
                consumer: Some(consumer),
                ..RequestFilter::default()
            };
            requests.extend(tx.find_requests(&filter).await?);
        }
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    /// Completed requests whose selected offer belongs to `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Store`] on persistence failure.
    pub async fn requests_completed_by(&self, provider: ProviderId) -> Result<Vec<Request>> {
        let filter = RequestFilter {
            completed: true,
            provider: Some(provider),
            ..RequestFilter::default()
        };
        self.find_requests(&filter).await
    }

    /// Offers on a request, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if the request does not exist.
    pub async fn offers_for(&self, request: RequestId) -> Result<Vec<Offer>> {
        Ok(self.get_request(request).await?.offers)
    }
}

async fn consumer_account(
    tx: &mut dyn StoreTransaction,
    consumer: ConsumerId,
) -> Result<Option<AccountId>> {
    Ok(tx.consumer(consumer).await?.map(|c| c.account))
}

async fn provider_account(
    tx: &mut dyn StoreTransaction,
    provider: ProviderId,
) -> Result<Option<AccountId>> {
    Ok(tx.provider(provider).await?.map(|p| p.account))
}

async fn default_method(
    tx: &mut dyn StoreTransaction,
    account: AccountId,
) -> Result<Option<PaymentMethod>> {
    Ok(tx.methods_for(account).await?.into_iter().next())
}
