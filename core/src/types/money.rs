//! Fixed-point monetary amounts.
//!
//! Amounts are stored as whole paise (scale 2). All arithmetic is checked;
//! totals that would overflow are reported as `None` and must be rejected by
//! the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A monetary amount in minor units (paise), scale 2.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units (paise)
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Creates a `Money` value from whole rupees, if it does not overflow
    #[must_use]
    pub const fn checked_from_major(major: u64) -> Option<Self> {
        match major.checked_mul(100) {
            Some(minor) => Some(Self(minor)),
            None => None,
        }
    }

    /// Returns the amount in minor units (paise)
    #[must_use]
    pub const fn minor(self) -> u64 {
        self.0
    }

    /// Checked addition
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(minor) => Some(Self(minor)),
            None => None,
        }
    }

    /// Checked multiplication by a quantity
    #[must_use]
    pub const fn checked_mul(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(minor) => Some(Self(minor)),
            None => None,
        }
    }

    /// Percentage of this amount, rounded down to the nearest paisa.
    ///
    /// `percent` is clamped to 100.
    #[must_use]
    pub const fn percent(self, percent: u8) -> Self {
        let p = if percent > 100 { 100 } else { percent };
        Self(self.0 / 100 * p as u64 + self.0 % 100 * p as u64 / 100)
    }

    /// Sum an iterator of amounts, `None` on overflow
    #[must_use]
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_scale_two() {
        assert_eq!(Money::from_minor(149_950).to_string(), "1499.50");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
    }

    #[test]
    fn test_checked_mul_and_sum() {
        let unit = Money::from_minor(49_900);
        assert_eq!(unit.checked_mul(2), Some(Money::from_minor(99_800)));
        let total = Money::checked_sum([unit, unit, Money::from_minor(200)]);
        assert_eq!(total, Some(Money::from_minor(100_000)));
        assert_eq!(Money::from_minor(u64::MAX).checked_add(Money::from_minor(1)), None);
    }

    #[test]
    fn test_percent_rounds_down() {
        assert_eq!(Money::from_minor(10_000).percent(50), Money::from_minor(5_000));
        assert_eq!(Money::from_minor(99).percent(50), Money::from_minor(49));
        assert_eq!(Money::from_minor(10_000).percent(0), Money::ZERO);
        assert_eq!(Money::from_minor(10_000).percent(100), Money::from_minor(10_000));
    }
}
