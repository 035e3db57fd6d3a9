//! Payment ledger used directly: debits, credits, transfers and cards.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::Harness;
use proptest::prelude::*;
use taskmarket::ledger::CardRegistration;
use taskmarket::{Config, Entity, MarketError, ValidationReason};
use taskmarket_core::ids::PaymentMethodId;
use taskmarket_core::model::{PaymentKind, PaymentMethodKind};
use taskmarket_core::money::Money;
use taskmarket_core::store::MarketStore;
use taskmarket_testing::ScriptedProcessor;

// ============================================================================
// Movements
// ============================================================================

#[tokio::test]
async fn each_movement_kind_is_recorded_once() {
    let h = Harness::new();
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let provider = h.seed.provider("pat@example.com").await.unwrap();
    let paying = h.seed.card(consumer.account).await.unwrap();
    let paid = h.seed.card(provider.account).await.unwrap();

    let debit = h
        .market
        .ledger
        .debit(paying.id, Money::from_cents(500))
        .await
        .unwrap();
    let credit = h
        .market
        .ledger
        .credit(paid.id, Money::from_cents(250))
        .await
        .unwrap();
    let transfer = h
        .market
        .ledger
        .transfer(paying.id, paid.id, Money::from_cents(1_000))
        .await
        .unwrap();

    assert_eq!(debit.kind, PaymentKind::Debit);
    assert_eq!((debit.from, debit.to), (Some(paying.id), None));
    assert_eq!(credit.kind, PaymentKind::Credit);
    assert_eq!((credit.from, credit.to), (None, Some(paid.id)));
    assert_eq!(transfer.kind, PaymentKind::Transfer);

    let snapshot = h.store.snapshot().await;
    assert_eq!(snapshot.payment_commands, vec![debit, credit, transfer]);
    assert_eq!(
        h.market.ledger.commands_for(paying.id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn zero_amounts_are_recorded() {
    let h = Harness::new();
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let card = h.seed.card(consumer.account).await.unwrap();

    let command = h.market.ledger.debit(card.id, Money::from_cents(0)).await.unwrap();

    assert!(command.amount.is_zero());
    assert_eq!(h.processor.attempts(), 1);
    assert_eq!(h.store.snapshot().await.payment_commands, vec![command]);
}

#[tokio::test]
async fn declined_movement_writes_no_row() {
    let h = Harness::with_processor(ScriptedProcessor::new().failing_next(1));
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let card = h.seed.card(consumer.account).await.unwrap();

    let result = h.market.ledger.debit(card.id, Money::from_cents(899)).await;

    assert!(matches!(result, Err(MarketError::PaymentFailure(_))));
    assert!(h.store.snapshot().await.payment_commands.is_empty());

    // A fresh attempt is independent of the failed one.
    h.market.ledger.debit(card.id, Money::from_cents(899)).await.unwrap();
    assert_eq!(h.store.snapshot().await.payment_commands.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_processor_times_out_without_a_row() {
    let mut config = Config::default();
    config.payments.timeout_ms = 100;
    let processor = ScriptedProcessor::new().with_delay(std::time::Duration::from_secs(60));
    let h = Harness::with(processor, config);
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let card = h.seed.card(consumer.account).await.unwrap();

    let result = h.market.ledger.debit(card.id, Money::from_cents(899)).await;

    assert!(matches!(result, Err(MarketError::PaymentFailure(_))));
    assert!(h.store.snapshot().await.payment_commands.is_empty());
}

#[tokio::test]
async fn unknown_method_is_not_found() {
    let h = Harness::new();

    let result = h
        .market
        .ledger
        .credit(PaymentMethodId::new(), Money::from_cents(100))
        .await;

    assert!(matches!(
        result,
        Err(MarketError::NotFound(Entity::PaymentMethod))
    ));
    assert_eq!(h.processor.attempts(), 0);
}

#[tokio::test]
async fn movement_needs_at_least_one_end() {
    let h = Harness::new();
    let mut tx = h.store.begin().await.unwrap();

    let result = h
        .market
        .ledger
        .execute_in(tx.as_mut(), None, None, Money::from_cents(100))
        .await;

    assert!(matches!(
        result,
        Err(MarketError::Validation(ValidationReason::MissingPaymentEnds))
    ));
    drop(tx);
    assert_eq!(h.processor.attempts(), 0);
}

// ============================================================================
// Cards
// ============================================================================

#[tokio::test]
async fn registered_cards_are_listed_oldest_first() {
    let h = Harness::new();
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let seeded = h.seed.card(consumer.account).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(1));

    let registered = h
        .market
        .ledger
        .register_card(
            consumer.account,
            CardRegistration {
                number: "4111 1111 1111 1234".to_string(),
                expiry: "04/30".to_string(),
                holder_name: "Carol".to_string(),
            },
        )
        .await
        .unwrap();

    let PaymentMethodKind::Card(details) = &registered.kind;
    assert_eq!(details.last_four, "1234");

    let methods = h
        .market
        .ledger
        .payment_methods_for(consumer.account)
        .await
        .unwrap();
    assert_eq!(methods, vec![seeded, registered]);
    assert!(h.store.snapshot().await.payment_commands.is_empty());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn a_row_exists_exactly_for_each_approved_movement(
        outcomes in proptest::collection::vec(any::<bool>(), 1..12),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let processor = ScriptedProcessor::new();
            let h = Harness::with_processor(processor.clone());
            let consumer = h.seed.consumer("carol@example.com").await.unwrap();
            let good = h.seed.card(consumer.account).await.unwrap();
            let bad = h.seed.card(consumer.account).await.unwrap();
            let _ = processor.declining(bad.id);

            for approve in &outcomes {
                let card = if *approve { good.id } else { bad.id };
                let _ = h.market.ledger.debit(card, Money::from_cents(100)).await;
            }

            let approved = outcomes.iter().filter(|a| **a).count();
            let snapshot = h.store.snapshot().await;
            assert_eq!(snapshot.payment_commands.len(), approved);
            assert_eq!(h.processor.executed().len(), approved);
            assert_eq!(h.processor.attempts(), outcomes.len());
            assert!(snapshot.payment_commands.iter().all(|c| c.from == Some(good.id)));
        });
    }
}
