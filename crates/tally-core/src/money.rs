//! # Money Module
//!
//! Provides the `Money` type for handling invoice amounts exactly.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (paise / cents), scale 2            │
//! │    40000 × 1800 bps = 72000000 → /10000 = 7200 → 72.00                 │
//! │    Every intermediate value is an exact integer.                       │
//! │                                                                         │
//! │  ROUNDING: half-up, applied where the value is computed                │
//! │    0.825 → 0.83, 0.824 → 0.82, never deferred to display               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::types::TaxRate;
//!
//! let price = Money::from_minor(20000); // 200.00
//! let taxable = price.multiply_quantity(2).unwrap(); // 400.00
//! let tax = taxable.percentage_of(TaxRate::from_bps(1800)).unwrap(); // 18%
//!
//! assert_eq!(tax.to_string(), "72.00");
//! assert_eq!(taxable.checked_add(tax).unwrap().to_string(), "472.00");
//! ```
//!
//! ## Overflow
//! Invoice arithmetic is checked: `multiply_quantity`, `percentage_of` and
//! `checked_add` return `None` when the result leaves the `i64` range, and
//! the calculator turns that into `CoreError::AmountOutOfRange`. The `+`
//! operator saturates; it only runs over totals that were already checked,
//! so reports never fail.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::TaxRate;

/// Minor units per major unit (scale 2).
const MINOR_PER_MAJOR: i64 = 100;

/// Basis points in 100%.
const BPS_PER_WHOLE: i128 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in minor units (two fractional digits).
///
/// ## Where Money Flows
/// ```text
/// Product.price ──► LineItem.unit_price ──► taxable ──► tax ──► line total
///                                               │          │
///                                               ▼          ▼
///                                  Invoice.subtotal   Invoice.total_tax
///                                               └────┬─────┘
///                                                    ▼
///                                          Invoice.grand_total ──► revenue
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_minor(1099); // 10.99
    /// assert_eq!(price.minor(), 1099);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from major and minor parts.
    ///
    /// `from_major_minor(10, 99)` is 10.99.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        Money(major * MINOR_PER_MAJOR + minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the whole major units.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the fractional part (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    /// Returns zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by an integer quantity, `None` on overflow.
    ///
    /// Exact: no rounding is involved because the multiplier is a count.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(299);
    /// assert_eq!(unit_price.multiply_quantity(3).unwrap().minor(), 897);
    /// assert!(unit_price.multiply_quantity(i64::MAX).is_none());
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(minor) => Some(Money(minor)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(minor) => Some(Money(minor)),
            None => None,
        }
    }

    /// Computes `self × rate / 100`, rounded half-up to two decimals.
    /// `None` when the result does not fit in minor units.
    ///
    /// ## Implementation
    /// Minor units times basis points is the value at scale 6 of a major
    /// unit; dividing by 10000 brings it back to scale 2. i128 keeps the
    /// product from overflowing on large invoices.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    /// use tally_core::types::TaxRate;
    ///
    /// let amount = Money::from_minor(1000); // 10.00
    /// let tax = amount.percentage_of(TaxRate::from_bps(825)).unwrap(); // 8.25%
    /// // 0.825 → 0.83
    /// assert_eq!(tax.minor(), 83);
    /// ```
    pub fn percentage_of(&self, rate: TaxRate) -> Option<Money> {
        let scaled = i128::from(self.0) * i128::from(rate.bps());
        i64::try_from(div_round_half_up(scaled, BPS_PER_WHOLE))
            .ok()
            .map(Money)
    }

    /// Splits the amount into one of two equal shares, rounded half-up.
    ///
    /// Each share is rounded on its own, so two shares of an odd amount sum
    /// to one unit more than the original.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(9000).half().minor(), 4500);
    /// assert_eq!(Money::from_minor(9001).half().minor(), 4501);
    /// ```
    pub fn half(&self) -> Money {
        self.divide_by(2)
    }

    /// Divides by a count, rounded half-up. Zero count gives zero.
    pub fn divide_by(&self, count: u64) -> Money {
        if count == 0 {
            return Money::zero();
        }
        Money(div_round_half_up(self.0 as i128, count as i128) as i64)
    }
}

/// Integer division rounding ties away from zero (`HALF_UP`).
fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;

    if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) != (denominator < 0) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain two-decimal rendering (`472.00`), no currency symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

/// Parses decimal text exactly.
///
/// ## Accepted
/// `"400"`, `"400.5"`, `"400.50"`, `" 12.00 "`
///
/// ## Rejected
/// Negative amounts, more than two fractional digits, anything that is not
/// digits with an optional single dot.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let minor = parse_scaled(s.trim(), 2).ok_or_else(|| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("'{}' is not a non-negative amount with at most 2 decimals", s),
        })?;
        Ok(Money(minor))
    }
}

/// Parses `digits[.digits]` into an integer scaled by `10^scale`.
///
/// Shared with [`TaxRate`] parsing, which uses the same two-decimal scale.
pub(crate) fn parse_scaled(text: &str, scale: u32) -> Option<i64> {
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };

    if whole.is_empty() || fraction.len() > scale as usize {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    if text.ends_with('.') {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let mut fraction_value: i64 = if fraction.is_empty() {
        0
    } else {
        fraction.parse().ok()?
    };
    for _ in fraction.len()..scale as usize {
        fraction_value *= 10;
    }

    whole
        .checked_mul(10_i64.pow(scale))?
        .checked_add(fraction_value)
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Saturating; see the module docs on overflow.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
