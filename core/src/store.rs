//! Persistence collaborator traits.
//!
//! The workflow never talks to a database directly. It opens a
//! [`StoreTransaction`] from a [`MarketStore`], reads and writes through the
//! per-concern traits the transaction implements, and commits.
//!
//! # Locking
//!
//! Methods named `*_for_update` lock the returned row until the transaction
//! ends, so a decision taken on the value read cannot be invalidated by a
//! concurrent writer. Two concurrent completions of the same request
//! therefore serialize: the second one observes the first one's
//! `completed_date`.
//!
//! # Rollback
//!
//! Dropping a transaction without calling [`StoreTransaction::commit`] discards
//! every write made through it. [`StoreTransaction::rollback`] does the same
//! explicitly and reports failures.
//!
//! # Implementations
//!
//! - `PostgresMarketStore` (in `taskmarket-postgres`): row locks via
//!   `SELECT ... FOR UPDATE`
//! - `InMemoryStore` (in `taskmarket-testing`): serializable, one transaction
//!   at a time

use crate::ids::{AccountId, ConsumerId, OfferId, PaymentMethodId, ProviderId, RequestId};
use crate::model::{
    Account, Consumer, Notification, Offer, PaymentCommand, PaymentMethod, Provider, Request,
    RequestFilter, Review,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be mapped to a domain value.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A write referenced a row that does not exist.
    #[error("Missing row: {0}")]
    MissingRow(String),

    /// The transaction could not be committed; nothing was written.
    #[error("Commit failed: {0}")]
    CommitFailed(String),
}

/// Account, consumer and provider profiles.
#[async_trait]
pub trait ProfileStore: Send {
    /// Look up an account.
    async fn account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Insert a new account.
    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError>;

    /// Resolve the consumer profile owned by an account.
    async fn consumer_by_account(
        &mut self,
        account: AccountId,
    ) -> Result<Option<Consumer>, StoreError>;

    /// Load a consumer without locking it.
    async fn consumer(&mut self, id: ConsumerId) -> Result<Option<Consumer>, StoreError>;

    /// Load a consumer and lock it for the rest of the transaction.
    async fn consumer_for_update(
        &mut self,
        id: ConsumerId,
    ) -> Result<Option<Consumer>, StoreError>;

    /// Insert a new consumer profile.
    async fn insert_consumer(&mut self, consumer: &Consumer) -> Result<(), StoreError>;

    /// Persist consumer counters.
    async fn update_consumer(&mut self, consumer: &Consumer) -> Result<(), StoreError>;

    /// Resolve the provider profile owned by an account.
    async fn provider_by_account(
        &mut self,
        account: AccountId,
    ) -> Result<Option<Provider>, StoreError>;

    /// Load a provider without locking it.
    async fn provider(&mut self, id: ProviderId) -> Result<Option<Provider>, StoreError>;

    /// Load a provider and lock it for the rest of the transaction.
    async fn provider_for_update(
        &mut self,
        id: ProviderId,
    ) -> Result<Option<Provider>, StoreError>;

    /// Insert a new provider profile.
    async fn insert_provider(&mut self, provider: &Provider) -> Result<(), StoreError>;

    /// Persist provider rating and subscription fields.
    async fn update_provider(&mut self, provider: &Provider) -> Result<(), StoreError>;

    /// Set-based expiry of lapsed subscriptions.
    ///
    /// Clears `is_premium`, `is_subscription_active` and `subscription_date` on
    /// every provider with an inactive subscription whose non-null
    /// `subscription_date` is older than `cutoff`. Returns the number of rows
    /// changed.
    async fn expire_lapsed_subscriptions(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Providers with an active subscription last charged before `cutoff`.
    async fn providers_due_for_renewal(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ProviderId>, StoreError>;
}

/// Registered payment methods.
#[async_trait]
pub trait PaymentMethodStore: Send {
    /// All methods of an account, oldest first.
    async fn methods_for(&mut self, account: AccountId)
    -> Result<Vec<PaymentMethod>, StoreError>;

    /// Look up a method by id.
    async fn method(&mut self, id: PaymentMethodId) -> Result<Option<PaymentMethod>, StoreError>;

    /// Register a new method.
    async fn insert_method(&mut self, method: &PaymentMethod) -> Result<(), StoreError>;
}

/// Requests and offers.
#[async_trait]
pub trait RequestStore: Send {
    /// Load a request without locking it.
    async fn request(&mut self, id: RequestId) -> Result<Option<Request>, StoreError>;

    /// Load a request and lock it for the rest of the transaction.
    async fn request_for_update(&mut self, id: RequestId) -> Result<Option<Request>, StoreError>;

    /// Insert a new request.
    async fn insert_request(&mut self, request: &Request) -> Result<(), StoreError>;

    /// Persist `selected_offer` and `completed_date`.
    async fn update_request(&mut self, request: &Request) -> Result<(), StoreError>;

    /// Requests matching a filter, oldest first.
    async fn find_requests(&mut self, filter: &RequestFilter)
    -> Result<Vec<Request>, StoreError>;

    /// Look up an offer.
    async fn offer(&mut self, id: OfferId) -> Result<Option<Offer>, StoreError>;

    /// Insert a new offer.
    async fn insert_offer(&mut self, offer: &Offer) -> Result<(), StoreError>;

    /// All offers on a request, oldest first.
    async fn offers_for(&mut self, request: RequestId) -> Result<Vec<Offer>, StoreError>;
}

/// Append-only payment ledger.
#[async_trait]
pub trait LedgerStore: Send {
    /// Append one ledger row.
    async fn append_payment_command(&mut self, command: &PaymentCommand)
    -> Result<(), StoreError>;

    /// Ledger rows touching a method (either end), oldest first.
    async fn payment_commands_for(
        &mut self,
        method: PaymentMethodId,
    ) -> Result<Vec<PaymentCommand>, StoreError>;
}

/// Persisted notification history.
#[async_trait]
pub trait NotificationStore: Send {
    /// Insert one notification.
    async fn insert_notification(&mut self, notification: &Notification)
    -> Result<(), StoreError>;

    /// Notifications of an account, newest first, optionally only those
    /// strictly after `after`.
    async fn notifications_for(
        &mut self,
        account: AccountId,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, StoreError>;
}

/// Reviews of completed requests.
#[async_trait]
pub trait ReviewStore: Send {
    /// Insert one review.
    async fn insert_review(&mut self, review: &Review) -> Result<(), StoreError>;

    /// The review of a request, if any.
    async fn review_for(&mut self, request: RequestId) -> Result<Option<Review>, StoreError>;

    /// Reviews of requests whose selected offer belongs to `provider`.
    async fn reviews_of_provider(
        &mut self,
        provider: ProviderId,
    ) -> Result<Vec<Review>, StoreError>;
}

/// One atomic unit of work over every store concern.
#[async_trait]
pub trait StoreTransaction:
    ProfileStore + PaymentMethodStore + RequestStore + LedgerStore + NotificationStore + ReviewStore
{
    /// Make every write visible atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CommitFailed`] if nothing could be written.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the backend failed to roll back.
    /// The writes are discarded regardless.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Entry point to persistence: hands out transactions.
///
/// Implementations must be `Send + Sync` so one store can be shared (`Arc`)
/// by the lifecycle engine, the ledger, the notification sinks and the
/// billing scheduler.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if no connection is available.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}
