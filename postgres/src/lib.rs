//! `PostgreSQL` store for TaskMarket.
//!
//! This crate implements [`MarketStore`] from `taskmarket-core` on top of a
//! sqlx connection pool. Every [`StoreTransaction`] is a real database
//! transaction:
//!
//! - `*_for_update` reads use `SELECT ... FOR UPDATE`, so two completions of
//!   the same request (or two renewals of the same provider) serialize on the
//!   row lock
//! - Dropping the transaction without committing rolls it back
//! - Money is stored as `BIGINT` cents and checked on the way in and out
//!
//! # Example
//!
//! ```ignore
//! use taskmarket_postgres::PostgresMarketStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresMarketStore::connect("postgres://localhost/taskmarket").await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod rows;
mod transaction;

pub use transaction::PostgresTransaction;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use taskmarket_core::store::{MarketStore, StoreError, StoreTransaction};

/// `PostgreSQL`-backed [`MarketStore`].
#[derive(Clone)]
pub struct PostgresMarketStore {
    pool: PgPool,
}

impl PostgresMarketStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a default pool of ten connections.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Create or upgrade the marketplace tables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Marketplace migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MarketStore for PostgresMarketStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to begin transaction: {e}")))?;
        Ok(Box::new(PostgresTransaction::new(tx)))
    }
}
