//! Shared harness for marketplace integration tests.

#![allow(dead_code)] // Each test binary uses a different subset

use std::sync::Arc;
use taskmarket::{Config, Marketplace};
use taskmarket_core::ids::AccountId;
use taskmarket_core::notify::Alert;
use taskmarket_testing::{
    InMemoryStore, ManualClock, MarketFixture, RecordingSink, ScriptedProcessor, test_time,
};

/// A marketplace over an in-memory store, with handles on every double.
pub struct Harness {
    pub store: InMemoryStore,
    pub processor: ScriptedProcessor,
    pub clock: ManualClock,
    pub seed: MarketFixture,
    pub market: Marketplace,
    pub inbox: RecordingSink,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(ScriptedProcessor::new(), Config::default())
    }

    pub fn with_processor(processor: ScriptedProcessor) -> Self {
        Self::with(processor, Config::default())
    }

    pub fn with(processor: ScriptedProcessor, config: Config) -> Self {
        let store = InMemoryStore::new();
        let clock = ManualClock::new(test_time());
        let market = Marketplace::new(
            Arc::new(store.clone()),
            Arc::new(processor.clone()),
            Arc::new(clock.clone()),
            &config,
        );
        let inbox = RecordingSink::new();
        market.fanout.register(Arc::new(inbox.clone()));

        Self {
            seed: MarketFixture::new(store.clone(), clock.clone()),
            store,
            processor,
            clock,
            market,
            inbox,
        }
    }

    /// Alerts delivered to `account`, in arrival order.
    pub fn alerts_to(&self, account: AccountId) -> Vec<Alert> {
        self.inbox
            .received()
            .into_iter()
            .filter(|alert| alert.account == account)
            .collect()
    }
}
