//! # Money
//!
//! Amounts are held as integer cents. Every arithmetic step rounds once,
//! half-up, at the moment it happens, so totals recomputed from line items
//! never drift from what the customer sees.
//!
//! On the wire an amount is a plain decimal number with two places
//! (`1.48`), which is what the receipt backend and the customer display expect.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// Absorbs binary representation error before rounding (`0.276 * 100` is
/// `27.599999…` in `f64`).
const ROUNDING_NUDGE: f64 = 1e-7;

/// Rounds to the nearest integer, ties away from zero.
pub fn round_half_up(value: f64) -> i64 {
    let magnitude = (value.abs() + ROUNDING_NUDGE + 0.5).floor() as i64;
    if value < 0.0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Rounds a decimal amount to two places, half-up on cents.
pub fn round2(value: f64) -> f64 {
    round_half_up(value * 100.0) as f64 / 100.0
}

/// A monetary amount in minor units (cents).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Money = Money(0);

    /// Create from minor units.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Create from a decimal amount, rounding half-up to cents.
    #[must_use]
    pub fn from_major(amount: f64) -> Self {
        Self(round_half_up(amount * 100.0))
    }

    /// Minor units.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Decimal amount with two places.
    #[must_use]
    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Multiply by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Apply a rate (e.g. a VAT rate of `0.23`) and round half-up to cents.
    #[must_use]
    pub fn apply_rate(self, rate: f64) -> Self {
        Self(round_half_up(self.0 as f64 * rate))
    }

    /// True when strictly greater than zero.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_major())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        Ok(Money::from_major(amount))
    }
}
