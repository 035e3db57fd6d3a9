//! Notification fan-out as seen from marketplace commands.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::Harness;
use std::sync::Arc;
use std::time::Duration;
use taskmarket::notifications::{EmailMessage, EmailTransport, PersistedSink};
use taskmarket::{Config, Marketplace};
use taskmarket_core::money::Money;
use taskmarket_core::notify::SinkError;
use taskmarket_testing::{
    FailingSink, InMemoryStore, MarketFixture, RecordingSink, ScriptedProcessor, StallingSink,
    test_clock,
};

#[derive(Clone, Default)]
struct Outbox {
    sent: Arc<std::sync::Mutex<Vec<EmailMessage>>>,
}

#[async_trait::async_trait]
impl EmailTransport for Outbox {
    async fn send(&self, message: &EmailMessage) -> Result<(), SinkError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[tokio::test]
async fn commands_persist_history() {
    let h = Harness::new();
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let provider = h.seed.provider("pat@example.com").await.unwrap();
    let request = h
        .seed
        .request(&consumer, "Fix tap", Money::from_dollars(100))
        .await
        .unwrap();

    h.market
        .lifecycle
        .create_offer(provider.id, request.id, None)
        .await
        .unwrap();

    let history = h
        .market
        .notifications_for(consumer.account, None)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].title, "Tasks");
    assert_eq!(
        history[0].content,
        "A provider is offering to do \"Fix tap\"."
    );

    let later = h
        .market
        .notifications_for(consumer.account, Some(history[0].created_at))
        .await
        .unwrap();
    assert!(later.is_empty());
}

#[tokio::test(start_paused = true)]
async fn broken_sinks_never_fail_a_command() {
    let h = Harness::new();
    h.market.fanout.register(Arc::new(FailingSink));
    h.market.fanout.register(Arc::new(StallingSink::default()));

    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let provider = h.seed.provider("pat@example.com").await.unwrap();
    let request = h
        .seed
        .request(&consumer, "Fix tap", Money::from_dollars(100))
        .await
        .unwrap();

    let offer = h
        .market
        .lifecycle
        .create_offer(provider.id, request.id, None)
        .await
        .unwrap();
    assert_eq!(h.store.snapshot().await.offers, vec![offer]);

    // Healthy sinks still got the alert.
    assert_eq!(h.alerts_to(consumer.account).len(), 1);
    assert_eq!(h.store.snapshot().await.notifications_to(consumer.account).len(), 1);
}

#[tokio::test]
async fn emails_go_to_the_account_address() {
    let store = InMemoryStore::new();
    let outbox = Outbox::default();
    let mut config = Config::default();
    config.notifications.email_subject_prefix = "TaskMarket".to_string();
    let market = Marketplace::with_email_transport(
        Arc::new(store.clone()),
        Arc::new(ScriptedProcessor::new()),
        Arc::new(test_clock()),
        &config,
        Arc::new(outbox.clone()),
    );
    let seed = MarketFixture::new(store.clone(), test_clock());

    let consumer = seed.consumer("carol@example.com").await.unwrap();
    let provider = seed.provider("pat@example.com").await.unwrap();
    let request = seed
        .request(&consumer, "Fix <tap>", Money::from_dollars(100))
        .await
        .unwrap();
    market
        .lifecycle
        .create_offer(provider.id, request.id, None)
        .await
        .unwrap();

    let sent = outbox.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "carol@example.com");
    assert_eq!(sent[0].subject, "TaskMarket | Tasks");
    assert!(sent[0].html_body.contains("Fix &lt;tap&gt;"));
}

#[tokio::test]
async fn sinks_can_be_swapped_at_runtime() {
    let h = Harness::new();
    assert_eq!(
        h.market.fanout.sink_names(),
        vec![PersistedSink::NAME, "email", "recording"]
    );

    assert!(h.market.fanout.unregister("recording"));
    let replacement = RecordingSink::new();
    h.market.fanout.register(Arc::new(replacement.clone()));

    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let report = h
        .market
        .fanout
        .send_notification(consumer.account, "Tasks", "Hello", None)
        .await;

    assert_eq!(report.delivered, 3);
    assert!(h.inbox.received().is_empty());
    assert_eq!(replacement.received().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_sink_is_cut_off_by_its_timeout() {
    let h = Harness::with(ScriptedProcessor::new(), Config::default());
    h.market
        .fanout
        .register(Arc::new(StallingSink::new(Duration::from_secs(3600))));
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();

    let started = tokio::time::Instant::now();
    let report = h
        .market
        .fanout
        .send_notification(consumer.account, "Tasks", "Hello", None)
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 3);
    assert!(started.elapsed() < Duration::from_secs(3600));
}
