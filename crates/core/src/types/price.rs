//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are never held as floats: the catalog sends fractional amounts and
//! the order backend sends integer cents, and both must round-trip exactly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-negative monetary amount in the store currency.
///
/// Serialized as a decimal string (the durable-cache format). Wire structs
/// that need JSON numbers use `rust_decimal::serde::float` on their own
/// fields and convert at the edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an amount in cents (the order-service wire unit).
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl std::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, std::ops::Add::add)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cents_scales_correctly() {
        assert_eq!(Price::from_cents(1999).to_string(), "$19.99");
        assert_eq!(Price::from_cents(0), Price::ZERO);
    }

    #[test]
    fn times_and_sum() {
        let unit = Price::from_cents(250);
        assert_eq!(unit.times(3), Price::from_cents(750));

        let total: Price = [Price::from_cents(100), Price::from_cents(50)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(150));
    }

    #[test]
    fn serializes_as_decimal_string() {
        let price = Price::from_cents(1050);
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"10.50\"");
    }
}
