//! User-facing notification texts.

use taskmarket_core::ids::AccountId;
use taskmarket_core::money::Money;
use taskmarket_core::notify::Alert;

/// Title of request and offer notifications.
pub const TASKS: &str = "Tasks";
/// Title of premium subscription notifications.
pub const SUBSCRIPTION: &str = "Subscription";
/// Title of review notifications.
pub const REVIEWS: &str = "Reviews";

/// To the consumer when an offer arrives.
#[must_use]
pub fn offer_created(consumer: AccountId, title: &str, price: Option<Money>) -> Alert {
    let content = match price {
        Some(price) => format!("A provider is offering to do \"{title}\" for {price}."),
        None => format!("A provider is offering to do \"{title}\"."),
    };
    Alert::new(consumer, TASKS, content)
}

/// To the provider whose offer was selected.
#[must_use]
pub fn offer_selected(provider: AccountId, title: &str) -> Alert {
    Alert::new(
        provider,
        TASKS,
        format!("Your offer for \"{title}\" has been selected."),
    )
}

/// To the provider whose offer was replaced by another.
#[must_use]
pub fn offer_unselected(provider: AccountId, title: &str) -> Alert {
    Alert::new(
        provider,
        TASKS,
        format!("Unfortunately, your offer for \"{title}\" has been unselected."),
    )
}

/// To both parties once a request settles.
#[must_use]
pub fn request_completed(account: AccountId, title: &str) -> Alert {
    Alert::new(account, TASKS, format!("\"{title}\" has been completed."))
}

/// To the provider of a reviewed request.
#[must_use]
pub fn review_added(provider: AccountId, title: &str) -> Alert {
    Alert::new(
        provider,
        REVIEWS,
        format!("A review of your performance in \"{title}\" has been added."),
    )
}

/// Renewal charged.
#[must_use]
pub fn subscription_extended(provider: AccountId) -> Alert {
    Alert::new(
        provider,
        SUBSCRIPTION,
        "Your premium subscription has been successfully extended.",
    )
}

/// Renewal impossible; premium cleared.
#[must_use]
pub fn subscription_cancelled(provider: AccountId) -> Alert {
    Alert::new(
        provider,
        SUBSCRIPTION,
        "Your premium subscription has been canceled, since you do not have a valid payment method.",
    )
}

/// Interactive activation.
#[must_use]
pub fn subscription_activated(provider: AccountId) -> Alert {
    Alert::new(
        provider,
        SUBSCRIPTION,
        "Your premium subscription has been activated.",
    )
}

/// Interactive deactivation.
#[must_use]
pub fn subscription_deactivated(provider: AccountId) -> Alert {
    Alert::new(
        provider,
        SUBSCRIPTION,
        "Your premium subscription has been deactivated. Your benefits will remain until the next billing period.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_text_mentions_price_only_when_present() {
        let account = AccountId::new();
        assert_eq!(
            offer_created(account, "Fix tap", Some(Money::from_cents(8_050))).content,
            "A provider is offering to do \"Fix tap\" for 80.50."
        );
        assert_eq!(
            offer_created(account, "Fix tap", None).content,
            "A provider is offering to do \"Fix tap\"."
        );
    }
}
