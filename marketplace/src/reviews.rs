//! Reviews of completed requests.
//!
//! A consumer may review a request once it is completed. The rating is added
//! to the selected provider's running total in the same transaction as the
//! review row, so the derived average never disagrees with the reviews.

use crate::error::{ConflictReason, Entity, MarketError, Result, ValidationReason};
use crate::messages;
use crate::notifications::NotificationFanout;
use std::sync::Arc;
use taskmarket_core::environment::Clock;
use taskmarket_core::ids::{ProviderId, RequestId, ReviewId};
use taskmarket_core::model::Review;
use taskmarket_core::store::{MarketStore, ProfileStore, RequestStore, ReviewStore};
use tracing::info;

/// Adds and lists reviews.
pub struct ReviewService {
    store: Arc<dyn MarketStore>,
    fanout: Arc<NotificationFanout>,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn MarketStore>,
        fanout: Arc<NotificationFanout>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            fanout,
            clock,
        }
    }

    /// Review a completed request.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] unless `1 <= rating <= 5`
    /// - [`MarketError::NotFound`] if the request does not exist
    /// - [`MarketError::Conflict`] if it is not completed or already reviewed
    pub async fn add_review(
        &self,
        request: RequestId,
        rating: u8,
        description: Option<String>,
    ) -> Result<Review> {
        if !(1..=5).contains(&rating) {
            return Err(ValidationReason::RatingOutOfRange.into());
        }

        let mut tx = self.store.begin().await?;
        let reviewed = tx
            .request_for_update(request)
            .await?
            .ok_or(MarketError::NotFound(Entity::Request))?;
        if !reviewed.is_completed() {
            return Err(ConflictReason::RequestNotComplete.into());
        }
        if tx.review_for(request).await?.is_some() {
            return Err(ConflictReason::AlreadyReviewed.into());
        }

        let offer_id = reviewed
            .selected_offer
            .ok_or(MarketError::NotFound(Entity::Offer))?;
        let offer = tx
            .offer(offer_id)
            .await?
            .ok_or(MarketError::NotFound(Entity::Offer))?;
        let mut provider = tx
            .provider_for_update(offer.provider)
            .await?
            .ok_or(MarketError::NotFound(Entity::Provider))?;

        let review = Review {
            id: ReviewId::new(),
            request,
            rating,
            description,
            created_at: self.clock.now(),
        };
        tx.insert_review(&review).await?;

        provider.total_rating = provider.total_rating.saturating_add(u32::from(rating));
        provider.review_count = provider.review_count.saturating_add(1);
        tx.update_provider(&provider).await?;
        tx.commit().await?;

        info!(
            review_id = %review.id,
            request_id = %request,
            provider_id = %provider.id,
            rating,
            "Review added"
        );

        self.fanout
            .send(messages::review_added(provider.account, &reviewed.title))
            .await;
        Ok(review)
    }

    /// The review of a request, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Store`] on persistence failure.
    pub async fn reviews_for(&self, request: RequestId) -> Result<Vec<Review>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.review_for(request).await?.into_iter().collect())
    }

    /// Reviews of every request the provider completed.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Store`] on persistence failure.
    pub async fn reviews_of_provider(&self, provider: ProviderId) -> Result<Vec<Review>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.reviews_of_provider(provider).await?)
    }
}
