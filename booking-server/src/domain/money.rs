//! Monetary amounts.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

/// An amount in minor currency units (cents).
///
/// Prices are snapshotted onto purchase records at purchase time and never
/// recomputed, so this type is deliberately a plain integer with no currency
/// conversion behaviour.
///
/// # Examples
///
/// ```
/// use booking_server::domain::Money;
///
/// let fare = Money::from_minor(4500);
/// assert_eq!((fare * 2).minor(), 9000);
/// assert_eq!(fare.to_string(), "45.00");
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(0);

    /// Create from minor units.
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Returns the amount in minor units.
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked multiplication by a count; `None` on overflow.
    pub fn checked_mul(self, count: u64) -> Option<Money> {
        self.0.checked_mul(count).map(Money)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Mul<u64> for Money {
    type Output = Money;

    fn mul(self, rhs: u64) -> Money {
        Money(self.0.saturating_mul(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
