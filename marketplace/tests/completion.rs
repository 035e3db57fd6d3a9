//! Request completion and settlement.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::Harness;
use std::sync::Arc;
use taskmarket::{ConflictReason, MarketError};
use taskmarket_core::environment::Clock;
use taskmarket_core::model::{Offer, PaymentKind, PaymentMethod, Request, RequestFilter};
use taskmarket_core::money::Money;
use taskmarket_testing::ScriptedProcessor;

// ============================================================================
// Test Fixtures
// ============================================================================

struct Deal {
    request: Request,
    offer: Offer,
    consumer_card: PaymentMethod,
    provider_card: PaymentMethod,
}

/// Consumer and provider with one card each, and a request with the
/// provider's offer selected.
async fn selected_deal(h: &Harness, price: Option<Money>) -> Deal {
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let provider = h
        .seed
        .premium_provider("pat@example.com", h.clock.now())
        .await
        .unwrap();
    let consumer_card = h.seed.card(consumer.account).await.unwrap();
    let provider_card = h.seed.card(provider.account).await.unwrap();
    let request = h
        .seed
        .request(&consumer, "Fix tap", Money::from_dollars(100))
        .await
        .unwrap();
    let offer = h.seed.offer(&provider, &request, price).await.unwrap();
    let request = h.seed.select(&offer).await.unwrap();
    Deal {
        request,
        offer,
        consumer_card,
        provider_card,
    }
}

// ============================================================================
// Settlement
// ============================================================================

#[tokio::test]
async fn completion_transfers_the_offer_price() {
    let h = Harness::new();
    let deal = selected_deal(&h, Some(Money::from_cents(8_050))).await;

    let completion = h
        .market
        .lifecycle
        .complete_request(deal.request.id)
        .await
        .unwrap();

    assert_eq!(completion.request.completed_date, Some(h.clock.now()));
    assert_eq!(completion.payment.kind, PaymentKind::Transfer);
    assert_eq!(completion.payment.from, Some(deal.consumer_card.id));
    assert_eq!(completion.payment.to, Some(deal.provider_card.id));
    assert_eq!(completion.payment.amount, Money::from_cents(8_050));

    let snapshot = h.store.snapshot().await;
    assert_eq!(snapshot.payment_commands, vec![completion.payment.clone()]);
    assert_eq!(
        snapshot.consumer(deal.request.consumer).unwrap().requests_completed,
        1
    );
    assert_eq!(h.processor.executed().len(), 1);

    let completed_alerts = h
        .inbox
        .received()
        .into_iter()
        .filter(|a| a.content.contains("has been completed"))
        .count();
    assert_eq!(completed_alerts, 2);
}

#[tokio::test]
async fn unpriced_offer_settles_at_budget() {
    let h = Harness::new();
    let deal = selected_deal(&h, None).await;

    let completion = h
        .market
        .lifecycle
        .complete_request(deal.request.id)
        .await
        .unwrap();
    assert_eq!(completion.payment.amount, Money::from_dollars(100));
}

#[tokio::test]
async fn second_completion_is_a_conflict_and_moves_nothing() {
    let h = Harness::new();
    let deal = selected_deal(&h, None).await;

    h.market
        .lifecycle
        .complete_request(deal.request.id)
        .await
        .unwrap();
    let again = h.market.lifecycle.complete_request(deal.request.id).await;

    assert!(matches!(
        again,
        Err(MarketError::Conflict(ConflictReason::RequestAlreadyComplete))
    ));
    assert_eq!(h.store.snapshot().await.payment_commands.len(), 1);
    assert_eq!(h.processor.attempts(), 1);
}

#[tokio::test]
async fn concurrent_completions_settle_once() {
    let h = Arc::new(Harness::new());
    let deal = selected_deal(&h, None).await;

    let first = {
        let h = Arc::clone(&h);
        let id = deal.request.id;
        tokio::spawn(async move { h.market.lifecycle.complete_request(id).await })
    };
    let second = {
        let h = Arc::clone(&h);
        let id = deal.request.id;
        tokio::spawn(async move { h.market.lifecycle.complete_request(id).await })
    };

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
    let conflicted = outcomes
        .iter()
        .filter(|o| {
            matches!(
                o,
                Err(MarketError::Conflict(ConflictReason::RequestAlreadyComplete))
            )
        })
        .count();

    assert_eq!(succeeded, 1);
    assert_eq!(conflicted, 1);
    assert_eq!(h.store.snapshot().await.payment_commands.len(), 1);
}

// ============================================================================
// Failures roll back
// ============================================================================

#[tokio::test]
async fn declined_transfer_leaves_request_open() {
    let h = Harness::with_processor(ScriptedProcessor::new().failing_next(1));
    let deal = selected_deal(&h, None).await;

    let result = h.market.lifecycle.complete_request(deal.request.id).await;
    assert!(matches!(result, Err(MarketError::PaymentFailure(_))));

    let snapshot = h.store.snapshot().await;
    let request = snapshot.request(deal.request.id).unwrap();
    assert_eq!(request.completed_date, None);
    assert_eq!(request.selected_offer, Some(deal.offer.id));
    assert!(snapshot.payment_commands.is_empty());
    assert_eq!(
        snapshot.consumer(deal.request.consumer).unwrap().requests_completed,
        0
    );
    assert!(h.inbox.received().is_empty());

    // The processor recovered; the same request can now be completed.
    let completion = h
        .market
        .lifecycle
        .complete_request(deal.request.id)
        .await
        .unwrap();
    assert_eq!(completion.payment.amount, Money::from_dollars(100));
}

#[tokio::test]
async fn failed_commit_reports_a_store_error() {
    let h = Harness::new();
    let deal = selected_deal(&h, None).await;

    h.store.fail_next_commits(1);
    let result = h.market.lifecycle.complete_request(deal.request.id).await;

    assert!(matches!(result, Err(MarketError::Store(_))));
    let snapshot = h.store.snapshot().await;
    assert!(!snapshot.request(deal.request.id).unwrap().is_completed());
    assert!(snapshot.payment_commands.is_empty());
}

#[tokio::test]
async fn missing_payment_method_blocks_completion() {
    let h = Harness::new();
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let provider = h.seed.provider("pat@example.com").await.unwrap();
    h.seed.card(consumer.account).await.unwrap();
    let request = h
        .seed
        .request(&consumer, "Fix tap", Money::from_dollars(100))
        .await
        .unwrap();
    let offer = h.seed.offer(&provider, &request, None).await.unwrap();
    h.seed.select(&offer).await.unwrap();

    let result = h.market.lifecycle.complete_request(request.id).await;
    assert!(matches!(result, Err(MarketError::NoPaymentMethod)));
    assert!(
        !h.store
            .snapshot()
            .await
            .request(request.id)
            .unwrap()
            .is_completed()
    );
    assert_eq!(h.processor.attempts(), 0);
}

#[tokio::test]
async fn completion_needs_a_selected_offer() {
    let h = Harness::new();
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let request = h
        .seed
        .request(&consumer, "Fix tap", Money::from_dollars(100))
        .await
        .unwrap();

    let result = h.market.lifecycle.complete_request(request.id).await;
    assert!(matches!(
        result,
        Err(MarketError::Conflict(ConflictReason::NoSelectedOffer))
    ));
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn completed_requests_move_between_listings() {
    let h = Harness::new();
    let deal = selected_deal(&h, None).await;
    let provider = deal.offer.provider;

    let open = h
        .market
        .lifecycle
        .find_requests(&RequestFilter::open(Some("TAP".to_string()), None))
        .await
        .unwrap();
    assert_eq!(open.len(), 1);

    h.market
        .lifecycle
        .complete_request(deal.request.id)
        .await
        .unwrap();

    let open = h
        .market
        .lifecycle
        .find_requests(&RequestFilter::open(None, None))
        .await
        .unwrap();
    assert!(open.is_empty());

    let done = h
        .market
        .lifecycle
        .requests_completed_by(provider)
        .await
        .unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, deal.request.id);

    let posted = h
        .market
        .lifecycle
        .requests_posted_by(deal.request.consumer)
        .await
        .unwrap();
    assert_eq!(posted.len(), 1);
}
