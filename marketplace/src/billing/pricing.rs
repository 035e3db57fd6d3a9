//! Premium subscription pricing.
//!
//! One [`PremiumPricing`] value is built at startup and shared by the
//! interactive activation path and the renewal scheduler, so both always
//! charge the same amount for the same account.

use crate::config::BillingConfig;
use serde::{Deserialize, Serialize};
use taskmarket_core::model::Account;
use taskmarket_core::money::Money;

/// Price override for accounts whose email ends with a suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRule {
    /// Matched case-insensitively against the end of the account email
    pub email_suffix: String,
    /// Monthly price for matching accounts
    pub price: Money,
}

impl DiscountRule {
    /// Creates a rule charging `cents` to emails ending in `suffix`.
    #[must_use]
    pub fn new(suffix: impl Into<String>, cents: u64) -> Self {
        Self {
            email_suffix: suffix.into(),
            price: Money::from_cents(cents),
        }
    }

    fn applies_to(&self, email: &str) -> bool {
        email
            .to_lowercase()
            .ends_with(&self.email_suffix.to_lowercase())
    }
}

/// Pricing policy for premium subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PremiumPricing {
    standard: Money,
    discounts: Vec<DiscountRule>,
}

impl PremiumPricing {
    /// Policy charging `standard` to everyone.
    #[must_use]
    pub const fn new(standard: Money) -> Self {
        Self {
            standard,
            discounts: Vec::new(),
        }
    }

    /// Adds a discount rule. Rules are checked in insertion order.
    #[must_use]
    pub fn with_discount(mut self, rule: DiscountRule) -> Self {
        self.discounts.push(rule);
        self
    }

    /// Builds the policy from configuration.
    #[must_use]
    pub fn from_config(config: &BillingConfig) -> Self {
        Self {
            standard: Money::from_cents(config.premium_price_cents),
            discounts: config.discounts.clone(),
        }
    }

    /// The undiscounted price.
    #[must_use]
    pub const fn standard(&self) -> Money {
        self.standard
    }

    /// Monthly price for `account`: the first matching discount, otherwise
    /// the standard price.
    #[must_use]
    pub fn price_for(&self, account: &Account) -> Money {
        self.discounts
            .iter()
            .find(|rule| rule.applies_to(&account.email))
            .map_or(self.standard, |rule| rule.price)
    }
}

impl Default for PremiumPricing {
    fn default() -> Self {
        Self::new(Money::from_cents(899))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_discount_wins() {
        let pricing = PremiumPricing::default()
            .with_discount(DiscountRule::new(".uni.example", 450))
            .with_discount(DiscountRule::new("example", 700));

        assert_eq!(
            pricing.price_for(&Account::new("sam@CS.UNI.example")),
            Money::from_cents(450)
        );
        assert_eq!(
            pricing.price_for(&Account::new("sam@example")),
            Money::from_cents(700)
        );
        assert_eq!(
            pricing.price_for(&Account::new("sam@elsewhere.org")),
            Money::from_cents(899)
        );
    }

    #[test]
    fn config_builds_same_policy() {
        let config = BillingConfig {
            enabled: true,
            premium_price_cents: 1_000,
            discounts: vec![DiscountRule::new(".partner.example", 291)],
        };
        let pricing = PremiumPricing::from_config(&config);
        assert_eq!(pricing.standard(), Money::from_cents(1_000));
        assert_eq!(
            pricing.price_for(&Account::new("a@b.partner.example")),
            Money::from_cents(291)
        );
    }
}
