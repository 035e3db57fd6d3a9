//! Domain entities.
//!
//! These are plain, fully-populated value objects. Relationships are held by
//! id (a request stores the id of its selected offer, an offer stores the id of
//! its request) and resolved through the store explicitly; nothing here loads
//! lazily.

use crate::ids::{
    AccountId, ConsumerId, NotificationId, OfferId, PaymentCommandId, PaymentMethodId,
    ProviderId, RequestId, ReviewId,
};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Profiles
// ============================================================================

/// A registered account. Profiles and payment methods hang off accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identity
    pub id: AccountId,
    /// Contact email, used by the email sink and premium discount rules
    pub email: String,
    /// Display name
    pub full_name: Option<String>,
}

impl Account {
    /// Creates a new account with a fresh id.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(),
            email: email.into(),
            full_name: None,
        }
    }
}

/// Consumer profile: the party that posts requests and pays for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    /// Consumer identity
    pub id: ConsumerId,
    /// Owning account
    pub account: AccountId,
    /// Incremented once per `CreateRequest`
    pub requests_posted: u32,
    /// Incremented once per successful `CompleteRequest`
    pub requests_completed: u32,
}

impl Consumer {
    /// Creates a consumer profile with zeroed counters.
    #[must_use]
    pub fn new(account: AccountId) -> Self {
        Self {
            id: ConsumerId::new(),
            account,
            requests_posted: 0,
            requests_completed: 0,
        }
    }
}

/// Provider profile: the party that makes offers and gets paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Provider identity
    pub id: ProviderId,
    /// Owning account
    pub account: AccountId,
    /// Free-form profile text
    pub description: Option<String>,
    /// Sum of all review ratings
    pub total_rating: u32,
    /// Number of reviews
    pub review_count: u32,
    /// Holds premium benefits (priced offers)
    pub is_premium: bool,
    /// Subscription renews automatically
    pub is_subscription_active: bool,
    /// Time of the last successful subscription charge
    pub subscription_date: Option<DateTime<Utc>>,
}

impl Provider {
    /// Creates a non-premium provider profile.
    #[must_use]
    pub fn new(account: AccountId) -> Self {
        Self {
            id: ProviderId::new(),
            account,
            description: None,
            total_rating: 0,
            review_count: 0,
            is_premium: false,
            is_subscription_active: false,
            subscription_date: None,
        }
    }

    /// Average rating, derived from the stored sum and count.
    #[must_use]
    pub fn average_rating(&self) -> Option<f64> {
        if self.review_count == 0 {
            None
        } else {
            Some(f64::from(self.total_rating) / f64::from(self.review_count))
        }
    }

    /// Clears every premium field.
    pub const fn cancel_subscription(&mut self) {
        self.is_premium = false;
        self.is_subscription_active = false;
        self.subscription_date = None;
    }

    /// Marks a successful subscription charge at `at`.
    pub const fn renew_subscription(&mut self, at: DateTime<Utc>) {
        self.is_premium = true;
        self.is_subscription_active = true;
        self.subscription_date = Some(at);
    }

    /// Whether the provider is in the paid window after deactivation:
    /// benefits remain but nothing renews.
    #[must_use]
    pub const fn is_lapsing(&self) -> bool {
        self.is_premium && !self.is_subscription_active && self.subscription_date.is_some()
    }

    /// Whether a lapsing provider's last paid month is still running, i.e.
    /// it was charged no earlier than `cutoff`. Bulk expiry clears exactly
    /// the lapsing providers for which this is false.
    #[must_use]
    pub fn is_within_paid_period(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_lapsing() && self.subscription_date.is_some_and(|date| date >= cutoff)
    }

    /// Checks the subscription-field invariant.
    ///
    /// An active subscription implies premium status and a charge date; no
    /// charge date implies no active subscription.
    #[must_use]
    pub const fn subscription_fields_consistent(&self) -> bool {
        if self.is_subscription_active {
            self.is_premium && self.subscription_date.is_some()
        } else {
            true
        }
    }
}

// ============================================================================
// Requests and offers
// ============================================================================

/// Caller-supplied fields of a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    /// Short title
    pub title: String,
    /// Full description of the task
    pub description: String,
    /// Where the task takes place
    pub location: String,
    /// Maximum the consumer will pay
    pub budget: Money,
    /// Optional deadline
    pub due_date: Option<DateTime<Utc>>,
    /// Whether the task can be done remotely
    pub remote_eligible: bool,
}

/// A posted service request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Request identity
    pub id: RequestId,
    /// Owning consumer
    pub consumer: ConsumerId,
    /// Short title
    pub title: String,
    /// Full description of the task
    pub description: String,
    /// Where the task takes place
    pub location: String,
    /// Maximum the consumer will pay
    pub budget: Money,
    /// Optional deadline
    pub due_date: Option<DateTime<Utc>>,
    /// Whether the task can be done remotely
    pub remote_eligible: bool,
    /// Currently selected offer; always one of this request's offers
    pub selected_offer: Option<OfferId>,
    /// Set exactly once, on completion
    pub completed_date: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Request {
    /// Builds an open request owned by `consumer`.
    #[must_use]
    pub fn open(consumer: ConsumerId, details: NewRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::new(),
            consumer,
            title: details.title,
            description: details.description,
            location: details.location,
            budget: details.budget,
            due_date: details.due_date,
            remote_eligible: details.remote_eligible,
            selected_offer: None,
            completed_date: None,
            created_at,
        }
    }

    /// Whether the terminal completion marker is set.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed_date.is_some()
    }
}

/// A provider's bid on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Offer identity
    pub id: OfferId,
    /// Bidding provider
    pub provider: ProviderId,
    /// Request this offer belongs to
    pub request: RequestId,
    /// Discounted price; only premium providers may set it
    pub price: Option<Money>,
    /// Submission time
    pub created_at: DateTime<Utc>,
}

/// Query over requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFilter {
    /// Whitespace-separated words; any match against title or description
    pub keywords: Option<String>,
    /// Exact location match
    pub location: Option<String>,
    /// Match completed (`true`) or open (`false`) requests
    pub completed: bool,
    /// Only requests posted by this consumer
    pub consumer: Option<ConsumerId>,
    /// Only requests whose selected offer belongs to this provider
    pub provider: Option<ProviderId>,
}

impl RequestFilter {
    /// Open requests, optionally narrowed by keywords and location.
    #[must_use]
    pub fn open(keywords: Option<String>, location: Option<String>) -> Self {
        Self {
            keywords,
            location,
            completed: false,
            consumer: None,
            provider: None,
        }
    }

    /// Checks the keyword clause.
    ///
    /// Case-insensitive; a request matches when any keyword equals any word of
    /// its title or description. No keywords matches everything.
    #[must_use]
    pub fn matches_keywords(&self, request: &Request) -> bool {
        let Some(keywords) = self.keywords.as_deref() else {
            return true;
        };
        let wanted: HashSet<String> = keywords
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if wanted.is_empty() {
            return true;
        }
        format!("{} {}", request.title, request.description)
            .split_whitespace()
            .any(|word| wanted.contains(&word.to_lowercase()))
    }

    /// Checks every clause that can be evaluated on the request row alone.
    ///
    /// The `provider` clause needs the selected offer and is applied by the
    /// store.
    #[must_use]
    pub fn matches(&self, request: &Request) -> bool {
        request.is_completed() == self.completed
            && self
                .location
                .as_deref()
                .is_none_or(|location| request.location == location)
            && self.consumer.is_none_or(|consumer| request.consumer == consumer)
            && self.matches_keywords(request)
    }
}

// ============================================================================
// Payments
// ============================================================================

/// Card details kept for display. Full numbers and CVVs are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    /// Last four digits of the card number
    pub last_four: String,
    /// Expiry as printed on the card (MM/YY)
    pub expiry: String,
    /// Name on the card
    pub holder_name: String,
}

/// Payment method variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PaymentMethodKind {
    /// Credit or debit card
    Card(CardDetails),
}

/// A registered payment method: an opaque funding source or destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Method identity
    pub id: PaymentMethodId,
    /// Owning account
    pub account: AccountId,
    /// Variant details
    pub kind: PaymentMethodKind,
    /// Registration time; the earliest method is an account's default
    pub created_at: DateTime<Utc>,
}

/// Kind of money movement recorded by a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentKind {
    /// Money leaves a method into the system
    Debit,
    /// Money enters a method from the system
    Credit,
    /// Money moves directly between two methods
    Transfer,
}

impl PaymentKind {
    /// Derives the kind from which ends of the movement are present.
    #[must_use]
    pub const fn for_ends(from: bool, to: bool) -> Option<Self> {
        match (from, to) {
            (true, false) => Some(Self::Debit),
            (false, true) => Some(Self::Credit),
            (true, true) => Some(Self::Transfer),
            (false, false) => None,
        }
    }

    /// Convert kind to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Transfer => "transfer",
        }
    }

    /// Parse kind from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debit" => Some(Self::Debit),
            "credit" => Some(Self::Credit),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}

/// Append-only ledger row recording a confirmed money movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCommand {
    /// Row identity
    pub id: PaymentCommandId,
    /// Funding method; `None` for system-funded credits
    pub from: Option<PaymentMethodId>,
    /// Receiving method; `None` for system-absorbed debits
    pub to: Option<PaymentMethodId>,
    /// Amount moved
    pub amount: Money,
    /// Debit, credit or transfer
    pub kind: PaymentKind,
    /// When the movement was confirmed
    pub executed_at: DateTime<Utc>,
}

// ============================================================================
// Notifications and reviews
// ============================================================================

/// A persisted alert, readable later as notification history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification identity
    pub id: NotificationId,
    /// Recipient
    pub account: AccountId,
    /// Short title ("Tasks", "Subscription", ...)
    pub title: String,
    /// Plain-text body
    pub content: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A consumer's review of a completed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Review identity
    pub id: ReviewId,
    /// Reviewed request
    pub request: RequestId,
    /// 1 to 5
    pub rating: u8,
    /// Optional free text
    pub description: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}
