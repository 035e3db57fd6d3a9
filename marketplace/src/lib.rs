//! # TaskMarket
//!
//! A task marketplace workflow: consumers post requests with a budget,
//! providers bid, the consumer selects one offer and completes the request,
//! which settles payment from the consumer to the provider. Premium providers
//! may price their offers below budget and pay a monthly subscription renewed
//! by a nightly scheduler.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────────────┐   ┌─────────────────────────────┐
//!  │ RequestLifecycle     │   │ SubscriptionService /       │
//!  │ Engine               │   │ SubscriptionBillingScheduler│
//!  └──────────┬───────────┘   └──────────────┬──────────────┘
//!             │  settle / charge             │
//!             ▼                              ▼
//!      ┌───────────────┐            ┌─────────────────────┐
//!      │ PaymentLedger │            │ NotificationFanout  │
//!      └──────┬────────┘            └─────────┬───────────┘
//!             │                               │
//!     PaymentProcessor              PersistedSink, EmailSink, ...
//! ```
//!
//! All components share one [`MarketStore`](taskmarket_core::MarketStore).
//! Every command runs in a single store transaction that reads what it
//! decides on, writes, and commits; notifications go out only after the
//! commit, and never fail the command.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use taskmarket::{Config, Marketplace, ledger::SimulatedGateway};
//! use taskmarket_core::SystemClock;
//!
//! let market = Marketplace::new(store, SimulatedGateway::shared(), Arc::new(SystemClock), &Config::from_env());
//! let request = market.lifecycle.create_request(consumer, details).await?;
//! ```

pub mod app;
pub mod billing;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod messages;
pub mod metrics;
pub mod notifications;
pub mod reviews;

pub use app::Marketplace;
pub use config::Config;
pub use error::{ConflictReason, Entity, MarketError, Result, ValidationReason};

use taskmarket_core::store::StoreTransaction;

// Dropping also discards the writes; this only reports a failed rollback.
pub(crate) async fn abort(tx: Box<dyn StoreTransaction>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "Rollback failed");
    }
}
