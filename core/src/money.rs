//! Money value object (cents-based to avoid floating point errors).

use serde::{Deserialize, Serialize};

/// Represents money in cents to avoid floating-point arithmetic errors.
///
/// Amounts are never negative; the ledger's "non-negative amount" rule is
/// enforced by the type rather than checked at runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from dollars
    ///
    /// # Panics
    ///
    /// Panics if the conversion would overflow (dollars * 100 > `u64::MAX`).
    #[must_use]
    #[allow(clippy::panic)]
    pub const fn from_dollars(dollars: u64) -> Self {
        match dollars.checked_mul(100) {
            Some(cents) => Self(cents),
            None => panic!("Money::from_dollars overflow"),
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn displays_as_decimal_dollars() {
        assert_eq!(Money::from_cents(899).to_string(), "8.99");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_dollars(100).to_string(), "100.00");
    }

    proptest! {
        #[test]
        fn ordering_matches_cents(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            prop_assert_eq!(Money::from_cents(a) <= Money::from_cents(b), a <= b);
            prop_assert_eq!(Money::from_cents(a).min(Money::from_cents(b)).cents(), a.min(b));
        }
    }
}
