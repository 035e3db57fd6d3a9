//! Reviews of completed requests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::Harness;
use taskmarket::{ConflictReason, MarketError, ValidationReason};
use taskmarket_core::model::{Provider, Request};
use taskmarket_core::money::Money;

async fn finished_request(h: &Harness) -> (Request, Provider) {
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let provider = h.seed.provider("pat@example.com").await.unwrap();
    h.seed.card(consumer.account).await.unwrap();
    h.seed.card(provider.account).await.unwrap();
    let request = h
        .seed
        .request(&consumer, "Mow lawn", Money::from_dollars(60))
        .await
        .unwrap();
    let offer = h.seed.offer(&provider, &request, None).await.unwrap();
    h.seed.select(&offer).await.unwrap();
    let completion = h.market.lifecycle.complete_request(request.id).await.unwrap();
    (completion.request, provider)
}

#[tokio::test]
async fn review_updates_provider_rating() {
    let h = Harness::new();
    let (request, provider) = finished_request(&h).await;

    let review = h
        .market
        .reviews
        .add_review(request.id, 4, Some("Neat edges".to_string()))
        .await
        .unwrap();
    assert_eq!(review.rating, 4);

    let snapshot = h.store.snapshot().await;
    let rated = snapshot.provider(provider.id).unwrap();
    assert_eq!(rated.total_rating, 4);
    assert_eq!(rated.review_count, 1);
    assert_eq!(rated.average_rating(), Some(4.0));

    assert_eq!(
        h.market.reviews.reviews_for(request.id).await.unwrap(),
        vec![review.clone()]
    );
    assert_eq!(
        h.market
            .reviews
            .reviews_of_provider(provider.id)
            .await
            .unwrap(),
        vec![review]
    );

    let alerts = h.alerts_to(provider.account);
    let last = alerts.last().unwrap();
    assert_eq!(last.title, "Reviews");
    assert!(last.content.contains("\"Mow lawn\""));
}

#[tokio::test]
async fn request_is_reviewed_once() {
    let h = Harness::new();
    let (request, provider) = finished_request(&h).await;

    h.market
        .reviews
        .add_review(request.id, 5, None)
        .await
        .unwrap();
    let again = h.market.reviews.add_review(request.id, 1, None).await;

    assert!(matches!(
        again,
        Err(MarketError::Conflict(ConflictReason::AlreadyReviewed))
    ));
    let snapshot = h.store.snapshot().await;
    assert_eq!(snapshot.provider(provider.id).unwrap().total_rating, 5);
    assert_eq!(snapshot.reviews.len(), 1);
}

#[tokio::test]
async fn rating_must_be_one_to_five() {
    let h = Harness::new();
    let (request, _) = finished_request(&h).await;

    for rating in [0, 6] {
        let result = h.market.reviews.add_review(request.id, rating, None).await;
        assert!(matches!(
            result,
            Err(MarketError::Validation(ValidationReason::RatingOutOfRange))
        ));
    }
    assert!(h.store.snapshot().await.reviews.is_empty());
}

#[tokio::test]
async fn open_request_cannot_be_reviewed() {
    let h = Harness::new();
    let consumer = h.seed.consumer("carol@example.com").await.unwrap();
    let request = h
        .seed
        .request(&consumer, "Mow lawn", Money::from_dollars(60))
        .await
        .unwrap();

    let result = h.market.reviews.add_review(request.id, 3, None).await;
    assert!(matches!(
        result,
        Err(MarketError::Conflict(ConflictReason::RequestNotComplete))
    ));
}
