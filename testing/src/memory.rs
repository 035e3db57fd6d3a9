//! Transactional in-memory store.
//!
//! Transactions are fully serializable: [`InMemoryStore::begin`] takes an
//! exclusive lock on the tables for the lifetime of the transaction and works
//! on a private copy, which replaces the tables on commit. Dropping the
//! transaction discards the copy. This makes "the second concurrent
//! completion observes the first one's write" hold trivially, and lets tests
//! exercise rollback paths exactly.
//!
//! A task must not begin a second transaction while it still holds one; it
//! would wait on itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use taskmarket_core::ids::{
    AccountId, ConsumerId, OfferId, PaymentMethodId, ProviderId, RequestId,
};
use taskmarket_core::model::{
    Account, Consumer, Notification, Offer, PaymentCommand, PaymentMethod, Provider, Request,
    RequestFilter, Review,
};
use taskmarket_core::store::{
    LedgerStore, MarketStore, NotificationStore, PaymentMethodStore, ProfileStore, RequestStore,
    ReviewStore, StoreError, StoreTransaction,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Every table, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    /// Accounts
    pub accounts: Vec<Account>,
    /// Consumer profiles
    pub consumers: Vec<Consumer>,
    /// Provider profiles
    pub providers: Vec<Provider>,
    /// Payment methods
    pub methods: Vec<PaymentMethod>,
    /// Requests
    pub requests: Vec<Request>,
    /// Offers
    pub offers: Vec<Offer>,
    /// Ledger rows
    pub payment_commands: Vec<PaymentCommand>,
    /// Notification history
    pub notifications: Vec<Notification>,
    /// Reviews
    pub reviews: Vec<Review>,
}

impl MarketSnapshot {
    /// Find a request by id.
    #[must_use]
    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests.iter().find(|r| r.id == id)
    }

    /// Find a provider by id.
    #[must_use]
    pub fn provider(&self, id: ProviderId) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Find a consumer by id.
    #[must_use]
    pub fn consumer(&self, id: ConsumerId) -> Option<&Consumer> {
        self.consumers.iter().find(|c| c.id == id)
    }

    /// Notifications addressed to an account, in delivery order.
    #[must_use]
    pub fn notifications_to(&self, account: AccountId) -> Vec<&Notification> {
        self.notifications
            .iter()
            .filter(|n| n.account == account)
            .collect()
    }

    fn selected_provider(&self, request: &Request) -> Option<ProviderId> {
        let selected = request.selected_offer?;
        self.offers
            .iter()
            .find(|o| o.id == selected)
            .map(|o| o.provider)
    }
}

/// In-memory [`MarketStore`].
///
/// Cheap to clone; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<MarketSnapshot>>,
    failing_commits: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with [`StoreError::CommitFailed`].
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Copy of the committed tables.
    pub async fn snapshot(&self) -> MarketSnapshot {
        self.tables.lock().await.clone()
    }

    fn take_commit_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            staged,
            store: self.clone(),
        }))
    }
}

/// Transaction over an [`InMemoryStore`]: exclusive lock plus a staged copy.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MarketSnapshot>,
    staged: MarketSnapshot,
    store: InMemoryStore,
}

fn replace<T, F>(rows: &mut [T], row: &T, same: F, what: &str) -> Result<(), StoreError>
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    let slot = rows
        .iter_mut()
        .find(|r| same(r))
        .ok_or_else(|| StoreError::MissingRow(what.to_string()))?;
    *slot = row.clone();
    Ok(())
}

#[async_trait]
impl ProfileStore for InMemoryTransaction {
    async fn account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.staged.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        self.staged.accounts.push(account.clone());
        Ok(())
    }

    async fn consumer_by_account(
        &mut self,
        account: AccountId,
    ) -> Result<Option<Consumer>, StoreError> {
        Ok(self
            .staged
            .consumers
            .iter()
            .find(|c| c.account == account)
            .cloned())
    }

    async fn consumer(&mut self, id: ConsumerId) -> Result<Option<Consumer>, StoreError> {
        Ok(self.staged.consumer(id).cloned())
    }

    async fn consumer_for_update(
        &mut self,
        id: ConsumerId,
    ) -> Result<Option<Consumer>, StoreError> {
        Ok(self.staged.consumer(id).cloned())
    }

    async fn insert_consumer(&mut self, consumer: &Consumer) -> Result<(), StoreError> {
        self.staged.consumers.push(consumer.clone());
        Ok(())
    }

    async fn update_consumer(&mut self, consumer: &Consumer) -> Result<(), StoreError> {
        replace(
            &mut self.staged.consumers,
            consumer,
            |c| c.id == consumer.id,
            "consumer",
        )
    }

    async fn provider_by_account(
        &mut self,
        account: AccountId,
    ) -> Result<Option<Provider>, StoreError> {
        Ok(self
            .staged
            .providers
            .iter()
            .find(|p| p.account == account)
            .cloned())
    }

    async fn provider(&mut self, id: ProviderId) -> Result<Option<Provider>, StoreError> {
        Ok(self.staged.provider(id).cloned())
    }

    async fn provider_for_update(
        &mut self,
        id: ProviderId,
    ) -> Result<Option<Provider>, StoreError> {
        Ok(self.staged.provider(id).cloned())
    }

    async fn insert_provider(&mut self, provider: &Provider) -> Result<(), StoreError> {
        self.staged.providers.push(provider.clone());
        Ok(())
    }

    async fn update_provider(&mut self, provider: &Provider) -> Result<(), StoreError> {
        replace(
            &mut self.staged.providers,
            provider,
            |p| p.id == provider.id,
            "provider",
        )
    }

    async fn expire_lapsed_subscriptions(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut expired = 0;
        for provider in &mut self.staged.providers {
            let lapsed = !provider.is_subscription_active
                && provider.subscription_date.is_some_and(|date| date < cutoff);
            if lapsed {
                provider.cancel_subscription();
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn providers_due_for_renewal(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ProviderId>, StoreError> {
        Ok(self
            .staged
            .providers
            .iter()
            .filter(|p| {
                p.is_subscription_active && p.subscription_date.is_some_and(|date| date < cutoff)
            })
            .map(|p| p.id)
            .collect())
    }
}

#[async_trait]
impl PaymentMethodStore for InMemoryTransaction {
    async fn methods_for(
        &mut self,
        account: AccountId,
    ) -> Result<Vec<PaymentMethod>, StoreError> {
        let mut methods: Vec<PaymentMethod> = self
            .staged
            .methods
            .iter()
            .filter(|m| m.account == account)
            .cloned()
            .collect();
        methods.sort_by_key(|m| m.created_at);
        Ok(methods)
    }

    async fn method(&mut self, id: PaymentMethodId) -> Result<Option<PaymentMethod>, StoreError> {
        Ok(self.staged.methods.iter().find(|m| m.id == id).cloned())
    }

    async fn insert_method(&mut self, method: &PaymentMethod) -> Result<(), StoreError> {
        self.staged.methods.push(method.clone());
        Ok(())
    }
}

#[async_trait]
impl RequestStore for InMemoryTransaction {
    async fn request(&mut self, id: RequestId) -> Result<Option<Request>, StoreError> {
        Ok(self.staged.request(id).cloned())
    }

    async fn request_for_update(&mut self, id: RequestId) -> Result<Option<Request>, StoreError> {
        Ok(self.staged.request(id).cloned())
    }

    async fn insert_request(&mut self, request: &Request) -> Result<(), StoreError> {
        self.staged.requests.push(request.clone());
        Ok(())
    }

    async fn update_request(&mut self, request: &Request) -> Result<(), StoreError> {
        replace(
            &mut self.staged.requests,
            request,
            |r| r.id == request.id,
            "request",
        )
    }

    async fn find_requests(
        &mut self,
        filter: &RequestFilter,
    ) -> Result<Vec<Request>, StoreError> {
        Ok(self
            .staged
            .requests
            .iter()
            .filter(|r| filter.matches(r))
            .filter(|r| {
                filter
                    .provider
                    .is_none_or(|provider| self.staged.selected_provider(r) == Some(provider))
            })
            .cloned()
            .collect())
    }

    async fn offer(&mut self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        Ok(self.staged.offers.iter().find(|o| o.id == id).cloned())
    }

    async fn insert_offer(&mut self, offer: &Offer) -> Result<(), StoreError> {
        self.staged.offers.push(offer.clone());
        Ok(())
    }

    async fn offers_for(&mut self, request: RequestId) -> Result<Vec<Offer>, StoreError> {
        Ok(self
            .staged
            .offers
            .iter()
            .filter(|o| o.request == request)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerStore for InMemoryTransaction {
    async fn append_payment_command(
        &mut self,
        command: &PaymentCommand,
    ) -> Result<(), StoreError> {
        self.staged.payment_commands.push(command.clone());
        Ok(())
    }

    async fn payment_commands_for(
        &mut self,
        method: PaymentMethodId,
    ) -> Result<Vec<PaymentCommand>, StoreError> {
        Ok(self
            .staged
            .payment_commands
            .iter()
            .filter(|c| c.from == Some(method) || c.to == Some(method))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationStore for InMemoryTransaction {
    async fn insert_notification(
        &mut self,
        notification: &Notification,
    ) -> Result<(), StoreError> {
        self.staged.notifications.push(notification.clone());
        Ok(())
    }

    async fn notifications_for(
        &mut self,
        account: AccountId,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut found: Vec<Notification> = self
            .staged
            .notifications
            .iter()
            .filter(|n| n.account == account)
            .filter(|n| after.is_none_or(|after| n.created_at > after))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[async_trait]
impl ReviewStore for InMemoryTransaction {
    async fn insert_review(&mut self, review: &Review) -> Result<(), StoreError> {
        self.staged.reviews.push(review.clone());
        Ok(())
    }

    async fn review_for(&mut self, request: RequestId) -> Result<Option<Review>, StoreError> {
        Ok(self
            .staged
            .reviews
            .iter()
            .find(|r| r.request == request)
            .cloned())
    }

    async fn reviews_of_provider(
        &mut self,
        provider: ProviderId,
    ) -> Result<Vec<Review>, StoreError> {
        Ok(self
            .staged
            .reviews
            .iter()
            .filter(|review| {
                self.staged
                    .request(review.request)
                    .and_then(|request| self.staged.selected_provider(request))
                    == Some(provider)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        if this.store.take_commit_failure() {
            return Err(StoreError::CommitFailed("injected commit failure".to_string()));
        }
        let mut guard = this.guard;
        *guard = this.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use taskmarket_core::model::Account;

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = InMemoryStore::new();
        let account = Account::new("a@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&account).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.snapshot().await.accounts, vec![account]);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = InMemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_account(&Account::new("a@example.com")).await.unwrap();
        }
        assert!(store.snapshot().await.accounts.is_empty());
    }

    #[tokio::test]
    async fn injected_commit_failure_discards_writes_once() {
        let store = InMemoryStore::new();
        store.fail_next_commits(1);

        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&Account::new("a@example.com")).await.unwrap();
        assert!(matches!(tx.commit().await, Err(StoreError::CommitFailed(_))));
        assert!(store.snapshot().await.accounts.is_empty());

        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&Account::new("b@example.com")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.snapshot().await.accounts.len(), 1);
    }
}
