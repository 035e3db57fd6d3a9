//! Error taxonomy of the marketplace operations.
//!
//! Validation, not-found, conflict and missing-payment-method errors are
//! detected before anything is written. A payment failure rolls back the
//! whole operation. Notification delivery failures never appear here: the
//! fan-out swallows them.

use taskmarket_core::store::StoreError;
use thiserror::Error;

/// Generic message for anything the caller cannot act on.
pub const TRY_AGAIN: &str = "An error occurred. Please try again.";

/// Kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// Account
    Account,
    /// Consumer profile
    Consumer,
    /// Provider profile
    Provider,
    /// Service request
    Request,
    /// Offer
    Offer,
    /// Payment method
    PaymentMethod,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Account => "account",
            Self::Consumer => "consumer",
            Self::Provider => "provider",
            Self::Request => "request",
            Self::Offer => "offer",
            Self::PaymentMethod => "payment method",
        };
        f.write_str(name)
    }
}

/// Malformed or out-of-range input.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    /// Request title is blank
    #[error("title must not be empty")]
    EmptyTitle,

    /// Request budget is zero
    #[error("budget must be positive")]
    ZeroBudget,

    /// Offer price above the request budget
    #[error("offer price exceeds the request budget")]
    OfferPriceExceedsBudget,

    /// Priced offer from a provider without premium status
    #[error("only premium providers may price offers")]
    PremiumRequired,

    /// Offer belongs to another request
    #[error("offer does not belong to the request")]
    OfferNotForRequest,

    /// Payment method belongs to another account
    #[error("payment method does not belong to the account")]
    ForeignPaymentMethod,

    /// Movement with neither a source nor a destination
    #[error("a movement needs a source or a destination")]
    MissingPaymentEnds,

    /// Card number is not 12 to 19 digits
    #[error("invalid card number")]
    InvalidCardNumber,

    /// Card expiry is not MM/YY
    #[error("invalid card expiry")]
    InvalidCardExpiry,

    /// Review rating outside 1..=5
    #[error("rating must be between 1 and 5")]
    RatingOutOfRange,
}

/// Operation not valid in the current state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// Request already has a completion date
    #[error("request is already complete")]
    RequestAlreadyComplete,

    /// Completion without a selected offer
    #[error("request has no selected offer")]
    NoSelectedOffer,

    /// Review of an open request
    #[error("request is not complete")]
    RequestNotComplete,

    /// Second review of the same request
    #[error("request has already been reviewed")]
    AlreadyReviewed,

    /// Activation while active
    #[error("premium subscription is already active")]
    PremiumAlreadyActive,

    /// Deactivation while inactive
    #[error("premium subscription is not active")]
    PremiumNotActive,
}

/// Errors returned by marketplace operations.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Malformed or out-of-range input
    #[error("Validation failed: {0}")]
    Validation(ValidationReason),

    /// A referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(Entity),

    /// The operation is not valid in the current state
    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    /// A required party has no registered payment method
    #[error("A party has no registered payment method")]
    NoPaymentMethod,

    /// The money movement did not happen
    #[error("Payment failed: {0}")]
    PaymentFailure(String),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ValidationReason> for MarketError {
    fn from(reason: ValidationReason) -> Self {
        Self::Validation(reason)
    }
}

impl From<ConflictReason> for MarketError {
    fn from(reason: ConflictReason) -> Self {
        Self::Conflict(reason)
    }
}

impl MarketError {
    /// Stable, user-readable message. Internal failures are never leaked.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(reason) => match reason {
                ValidationReason::EmptyTitle | ValidationReason::ZeroBudget => {
                    "The specified service request is invalid."
                }
                ValidationReason::OfferPriceExceedsBudget => {
                    "Offer price exceeds service request's budget."
                }
                ValidationReason::PremiumRequired => "This feature requires a Premium account.",
                ValidationReason::OfferNotForRequest => "The specified offer is invalid.",
                ValidationReason::ForeignPaymentMethod
                | ValidationReason::MissingPaymentEnds
                | ValidationReason::InvalidCardNumber
                | ValidationReason::InvalidCardExpiry => {
                    "The specified payment method is invalid."
                }
                ValidationReason::RatingOutOfRange => "Ratings must be between 1 and 5.",
            },
            Self::NotFound(entity) => match entity {
                Entity::Consumer => "This functionality is only available to consumers.",
                Entity::Provider => "This functionality is only available to providers.",
                Entity::Request => "The specified service request is invalid.",
                Entity::Offer => "The specified offer is invalid.",
                Entity::PaymentMethod => "The specified payment method is invalid.",
                Entity::Account => TRY_AGAIN,
            },
            Self::Conflict(reason) => match reason {
                ConflictReason::RequestAlreadyComplete => "This request is already complete.",
                ConflictReason::NoSelectedOffer => "No offer has been selected for this request.",
                ConflictReason::RequestNotComplete => "This request has not been completed yet.",
                ConflictReason::AlreadyReviewed => "This request has already been reviewed.",
                ConflictReason::PremiumAlreadyActive => {
                    "You already have an active Premium subscription."
                }
                ConflictReason::PremiumNotActive => {
                    "You do not have an active Premium subscription."
                }
            },
            Self::NoPaymentMethod => "A party has not registered any payment method.",
            Self::PaymentFailure(_) => "The payment could not be processed. Please try again.",
            Self::Store(_) => TRY_AGAIN,
        }
    }
}

/// Result alias for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;
