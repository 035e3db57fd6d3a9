//! # TaskMarket Testing
//!
//! Test doubles and fixtures for the TaskMarket workflow.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - A transactional in-memory store ([`InMemoryStore`])
//! - A payment processor that can be told to fail ([`ScriptedProcessor`])
//! - Notification sinks that record, fail or stall ([`RecordingSink`],
//!   [`FailingSink`], [`StallingSink`])
//! - Seeding helpers ([`MarketFixture`])
//!
//! ## Example
//!
//! ```ignore
//! use taskmarket_testing::{InMemoryStore, MarketFixture, test_clock};
//!
//! #[tokio::test]
//! async fn test_posting() {
//!     let store = InMemoryStore::new();
//!     let fixture = MarketFixture::new(store.clone(), test_clock());
//!     let consumer = fixture.consumer("alice@example.com").await.unwrap();
//!     // drive the engine against `store`...
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use taskmarket_core::environment::Clock;

pub mod fixtures;
pub mod memory;
pub mod processor;
pub mod sinks;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use taskmarket_testing::mocks::FixedClock;
    /// use taskmarket_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the code under test.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Jump to an absolute time
        pub fn set(&self, time: DateTime<Utc>) {
            if let Ok(mut guard) = self.time.lock() {
                *guard = time;
            }
        }

        /// Move forward by `by`
        pub fn advance(&self, by: Duration) {
            if let Ok(mut guard) = self.time.lock() {
                *guard += by;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map_or_else(|poisoned| *poisoned.into_inner(), |guard| *guard)
        }
    }

    /// Create a default fixed clock for tests (2025-07-15 12:00:00 UTC)
    ///
    /// Mid-month, so "one month ago" and "31 days ago" fall on different days.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }

    /// The instant [`test_clock`] is frozen at.
    #[must_use]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_752_580_800, 0).unwrap_or_default()
    }
}

/// Install a `tracing` subscriber for test output. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,taskmarket=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use fixtures::MarketFixture;
pub use memory::InMemoryStore;
pub use mocks::{FixedClock, ManualClock, test_clock, test_time};
pub use processor::ScriptedProcessor;
pub use sinks::{FailingSink, RecordingSink, StallingSink};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-07-15T12:00:00+00:00");
    }

    #[test]
    fn test_manual_clock_shares_time_between_clones() {
        let clock = ManualClock::new(test_time());
        let handle = clock.clone();
        handle.advance(Duration::hours(2));
        assert_eq!(clock.now(), test_time() + Duration::hours(2));
    }
}
