//! Seeding helpers.
//!
//! The fixture writes rows straight into a store, bypassing the engines, so a
//! test can start from any state (a lapsing premium provider, a request with
//! an offer already selected, ...) without replaying the whole workflow.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use taskmarket_core::environment::Clock;
use taskmarket_core::ids::{AccountId, OfferId, PaymentMethodId};
use taskmarket_core::model::{
    Account, CardDetails, Consumer, NewRequest, Offer, PaymentMethod, PaymentMethodKind,
    Provider, Request,
};
use taskmarket_core::money::Money;
use taskmarket_core::store::{
    MarketStore, PaymentMethodStore, ProfileStore, RequestStore, StoreError,
};

/// Writes seed rows through its own short transactions.
pub struct MarketFixture {
    store: Arc<dyn MarketStore>,
    clock: Arc<dyn Clock>,
    sequence: AtomicI64,
}

impl MarketFixture {
    /// Seed into `store`, stamping rows with `clock`.
    pub fn new(store: impl MarketStore + 'static, clock: impl Clock + 'static) -> Self {
        Self {
            store: Arc::new(store),
            clock: Arc::new(clock),
            sequence: AtomicI64::new(0),
        }
    }

    // Strictly increasing timestamps keep "oldest method first" deterministic.
    fn stamp(&self) -> DateTime<Utc> {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.clock.now() + Duration::milliseconds(n)
    }

    /// Account plus consumer profile.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if a write fails.
    pub async fn consumer(&self, email: &str) -> Result<Consumer, StoreError> {
        let account = Account::new(email);
        let consumer = Consumer::new(account.id);
        let mut tx = self.store.begin().await?;
        tx.insert_account(&account).await?;
        tx.insert_consumer(&consumer).await?;
        tx.commit().await?;
        Ok(consumer)
    }

    /// Account plus non-premium provider profile.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if a write fails.
    pub async fn provider(&self, email: &str) -> Result<Provider, StoreError> {
        self.provider_with(email, |_| {}).await
    }

    /// Account plus provider profile, adjusted by `setup` before insert.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if a write fails.
    pub async fn provider_with(
        &self,
        email: &str,
        setup: impl FnOnce(&mut Provider) + Send,
    ) -> Result<Provider, StoreError> {
        let account = Account::new(email);
        let mut provider = Provider::new(account.id);
        setup(&mut provider);
        let mut tx = self.store.begin().await?;
        tx.insert_account(&account).await?;
        tx.insert_provider(&provider).await?;
        tx.commit().await?;
        Ok(provider)
    }

    /// Premium provider whose subscription was charged at `charged_at`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if a write fails.
    pub async fn premium_provider(
        &self,
        email: &str,
        charged_at: DateTime<Utc>,
    ) -> Result<Provider, StoreError> {
        self.provider_with(email, |p| p.renew_subscription(charged_at))
            .await
    }

    /// Register a card for the account. Each call is newer than the last.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if a write fails.
    pub async fn card(&self, account: AccountId) -> Result<PaymentMethod, StoreError> {
        let method = PaymentMethod {
            id: PaymentMethodId::new(),
            account,
            kind: PaymentMethodKind::Card(CardDetails {
                last_four: "4242".to_string(),
                expiry: "12/30".to_string(),
                holder_name: "Test Holder".to_string(),
            }),
            created_at: self.stamp(),
        };
        let mut tx = self.store.begin().await?;
        tx.insert_method(&method).await?;
        tx.commit().await?;
        Ok(method)
    }

    /// Open request owned by `consumer`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if a write fails.
    pub async fn request(
        &self,
        consumer: &Consumer,
        title: &str,
        budget: Money,
    ) -> Result<Request, StoreError> {
        let request = Request::open(
            consumer.id,
            NewRequest {
                title: title.to_string(),
                description: format!("{title} needed"),
                location: "Sydney".to_string(),
                budget,
                due_date: None,
                remote_eligible: false,
            },
            self.stamp(),
        );
        let mut tx = self.store.begin().await?;
        tx.insert_request(&request).await?;
        tx.commit().await?;
        Ok(request)
    }

    /// Offer by `provider` on `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if a write fails.
    pub async fn offer(
        &self,
        provider: &Provider,
        request: &Request,
        price: Option<Money>,
    ) -> Result<Offer, StoreError> {
        let offer = Offer {
            id: OfferId::new(),
            provider: provider.id,
            request: request.id,
            price,
            created_at: self.stamp(),
        };
        let mut tx = self.store.begin().await?;
        tx.insert_offer(&offer).await?;
        tx.commit().await?;
        Ok(offer)
    }

    /// Mark `offer` as the selected offer of its request.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the request is missing or a write fails.
    pub async fn select(&self, offer: &Offer) -> Result<Request, StoreError> {
        let mut tx = self.store.begin().await?;
        let mut request = tx
            .request_for_update(offer.request)
            .await?
            .ok_or_else(|| StoreError::MissingRow("request".to_string()))?;
        request.selected_offer = Some(offer.id);
        tx.update_request(&request).await?;
        tx.commit().await?;
        Ok(request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{InMemoryStore, test_clock};

    #[tokio::test]
    async fn cards_are_ordered_by_registration() {
        let store = InMemoryStore::new();
        let fixture = MarketFixture::new(store.clone(), test_clock());
        let consumer = fixture.consumer("c@example.com").await.unwrap();
        let first = fixture.card(consumer.account).await.unwrap();
        let second = fixture.card(consumer.account).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let methods = tx.methods_for(consumer.account).await.unwrap();
        assert_eq!(
            methods.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
    }

    #[tokio::test]
    async fn select_links_offer_to_request() {
        let store = InMemoryStore::new();
        let fixture = MarketFixture::new(store.clone(), test_clock());
        let consumer = fixture.consumer("c@example.com").await.unwrap();
        let provider = fixture.provider("p@example.com").await.unwrap();
        let request = fixture
            .request(&consumer, "Fix tap", Money::from_dollars(50))
            .await
            .unwrap();
        let offer = fixture.offer(&provider, &request, None).await.unwrap();
        fixture.select(&offer).await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(
            snapshot.request(request.id).unwrap().selected_offer,
            Some(offer.id)
        );
    }
}
