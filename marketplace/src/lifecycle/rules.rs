//! Pure decision rules of the request lifecycle.
//!
//! Each `validate_*` function looks at already-loaded values and either
//! accepts the command or names the reason it is refused. The engine loads
//! the values inside its transaction, asks these functions, and only then
//! writes. Nothing here touches the store.

use crate::error::{ConflictReason, MarketError, ValidationReason};
use taskmarket_core::ids::OfferId;
use taskmarket_core::model::{NewRequest, Offer, Provider, Request};
use taskmarket_core::money::Money;

/// A new request needs a title and a positive budget.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] naming the first problem found.
pub fn validate_new_request(details: &NewRequest) -> Result<(), MarketError> {
    if details.title.trim().is_empty() {
        return Err(ValidationReason::EmptyTitle.into());
    }
    if details.budget.is_zero() {
        return Err(ValidationReason::ZeroBudget.into());
    }
    Ok(())
}

/// An offer may be made on any request that is not completed. A price is
/// reserved to premium providers and capped by the budget.
///
/// # Errors
///
/// - [`ConflictReason::RequestAlreadyComplete`] on a completed request
/// - [`ValidationReason::PremiumRequired`] for a priced offer from a
///   non-premium provider
/// - [`ValidationReason::OfferPriceExceedsBudget`] for a price above budget
pub fn validate_offer(
    provider: &Provider,
    request: &Request,
    price: Option<Money>,
) -> Result<(), MarketError> {
    if request.is_completed() {
        return Err(ConflictReason::RequestAlreadyComplete.into());
    }
    if let Some(price) = price {
        if !provider.is_premium {
            return Err(ValidationReason::PremiumRequired.into());
        }
        if price > request.budget {
            return Err(ValidationReason::OfferPriceExceedsBudget.into());
        }
    }
    Ok(())
}

/// The selected offer must belong to the request, which must still be open.
///
/// # Errors
///
/// - [`ValidationReason::OfferNotForRequest`] for a foreign offer
/// - [`ConflictReason::RequestAlreadyComplete`] on a completed request
pub fn validate_selection(request: &Request, offer: &Offer) -> Result<(), MarketError> {
    if offer.request != request.id {
        return Err(ValidationReason::OfferNotForRequest.into());
    }
    if request.is_completed() {
        return Err(ConflictReason::RequestAlreadyComplete.into());
    }
    Ok(())
}

/// Completion needs an open request with a selected offer. Returns that
/// offer's id.
///
/// # Errors
///
/// - [`ConflictReason::RequestAlreadyComplete`] if already completed
/// - [`ConflictReason::NoSelectedOffer`] if nothing was selected
pub fn validate_completion(request: &Request) -> Result<OfferId, MarketError> {
    if request.is_completed() {
        return Err(ConflictReason::RequestAlreadyComplete.into());
    }
    request
        .selected_offer
        .ok_or(MarketError::Conflict(ConflictReason::NoSelectedOffer))
}

/// Amount moved on completion: the offer price if one was given, never more
/// than the budget.
#[must_use]
pub fn settlement_amount(request: &Request, offer: &Offer) -> Money {
    offer.price.unwrap_or(request.budget).min(request.budget)
}
