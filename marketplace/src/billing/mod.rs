//! Premium subscriptions: pricing, interactive toggles and the renewal
//! scheduler.
//!
//! The provider's `(is_premium, is_subscription_active, subscription_date)`
//! triple is only ever written by [`SubscriptionService`] and
//! [`SubscriptionBillingScheduler`], always under the provider row lock.
//! An active subscription always has premium status and a charge date. A
//! deactivated one keeps both until the bulk expiry clears them a month
//! after the last charge.

use chrono::{DateTime, Months, Utc};

pub mod pricing;
pub mod scheduler;
pub mod subscriptions;

pub use pricing::{DiscountRule, PremiumPricing};
pub use scheduler::{SubscriptionBillingScheduler, SweepReport, duration_until_next_midnight};
pub use subscriptions::SubscriptionService;

/// Charges older than this are a month stale: due for renewal if active,
/// expired if lapsing.
pub(crate) fn renewal_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(1)).unwrap_or(now)
}
