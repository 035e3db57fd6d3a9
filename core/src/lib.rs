//! # TaskMarket Core
//!
//! Domain model and collaborator traits for the TaskMarket workflow.
//!
//! Consumers post service requests, providers submit offers, a consumer
//! selects one offer, the provider completes the work and money moves between
//! the parties' payment methods. Providers may hold a recurring premium
//! subscription.
//!
//! This crate contains no I/O. It defines:
//!
//! - **Identifiers**: UUID newtypes for every entity ([`ids`])
//! - **Money**: cents-based amounts ([`money::Money`])
//! - **Entities**: requests, offers, profiles, payment methods, ledger
//!   commands, notifications and reviews ([`model`])
//! - **Collaborators**: the traits the workflow engine is written against
//!   ([`environment::Clock`], [`store::MarketStore`],
//!   [`payment::PaymentProcessor`], [`notify::NotificationSink`])
//!
//! ## Implementations
//!
//! - `taskmarket-postgres`: production `MarketStore` on `PostgreSQL`
//! - `taskmarket-testing`: in-memory store, scripted processor, recording sinks
//!
//! ## Transactions
//!
//! Every mutation goes through a [`store::StoreTransaction`] obtained from
//! [`store::MarketStore::begin`]. Reads made through a transaction that are
//! followed by a write (`*_for_update` methods) lock the row until the
//! transaction ends. Dropping a transaction without committing rolls it back.

pub mod environment;
pub mod ids;
pub mod model;
pub mod money;
pub mod notify;
pub mod payment;
pub mod store;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use environment::{Clock, SystemClock};
pub use ids::{
    AccountId, ConsumerId, NotificationId, OfferId, PaymentCommandId, PaymentMethodId,
    ProviderId, RequestId, ReviewId,
};
pub use model::{
    Account, CardDetails, Consumer, NewRequest, Notification, Offer, PaymentCommand,
    PaymentKind, PaymentMethod, PaymentMethodKind, Provider, Request, RequestFilter, Review,
};
pub use money::Money;
pub use notify::{Alert, NotificationSink, SinkError};
pub use payment::{Movement, PaymentProcessor, ProcessorError};
pub use store::{MarketStore, StoreError, StoreTransaction};
