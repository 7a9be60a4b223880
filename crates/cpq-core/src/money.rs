//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Option modifiers chain: (base + Σadd) × Πmultiply                      │
//! │    (100.00 + 20.00) × 1.1 in f64 = 132.00000000000003  ❌               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units + basis-point factors                │
//! │    12000 × 11000 / 10000 = 13200 minor units  ✅                        │
//! │    Every rate × amount product rounds once, half away from zero        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cpq_core::money::Money;
//!
//! let base = Money::from_cents(10_000);       // 100.00
//! let with_option = base + Money::from_cents(2_000);
//! assert_eq!(with_option.cents(), 12_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::{Multiplier, Percent, TaxRate, BPS_SCALE};

// =============================================================================
// Rounding
// =============================================================================

/// Divides `numerator` by `denominator`, rounding half away from zero.
///
/// Every "amount × rate" product in the crate funnels through here so that
/// refunds (negative amounts) round symmetrically with charges.
pub(crate) fn round_div(numerator: i128, denominator: i128) -> i64 {
    debug_assert!(denominator > 0);
    let half = denominator / 2;
    let rounded = if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    };
    rounded as i64
}

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: `add` modifiers and discounts can be negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Currency-agnostic**: the quote carries the currency code
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Template.base_price ─► modifier chain ─► tier discount ─► unit price   │
/// │                                                                         │
/// │  PriceListItem.unit_price ─► PriceResolver ─► QuoteItem.unit_price      │
/// │                                                                         │
/// │  QuoteItem.line_total ─► aggregate() ─► subtotal / tax / grand total    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use cpq_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole major units.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Calculates tax on this amount.
    ///
    /// ## Example
    /// ```rust
    /// use cpq_core::money::Money;
    /// use cpq_core::types::TaxRate;
    ///
    /// // 100.00 at 17% VAT = 17.00
    /// let tax = Money::from_cents(10_000).calculate_tax(TaxRate::from_bps(1700));
    /// assert_eq!(tax.cents(), 1_700);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money(round_div(
            self.0 as i128 * rate.bps() as i128,
            BPS_SCALE as i128,
        ))
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use cpq_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(13_200);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 39_600);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Applies a multiplicative price modifier.
    ///
    /// ## Example
    /// ```rust
    /// use cpq_core::money::Money;
    /// use cpq_core::types::Multiplier;
    ///
    /// let subtotal = Money::from_cents(12_000);
    /// let scaled = subtotal.scale(Multiplier::from_ten_thousandths(11_000)); // ×1.1
    /// assert_eq!(scaled.cents(), 13_200);
    /// ```
    pub fn scale(&self, factor: Multiplier) -> Money {
        Money(round_div(
            self.0 as i128 * factor.ten_thousandths() as i128,
            BPS_SCALE as i128,
        ))
    }

    /// Returns `percent` of this amount.
    ///
    /// ## Example
    /// ```rust
    /// use cpq_core::money::Money;
    /// use cpq_core::types::Percent;
    ///
    /// let amount = Money::from_cents(10_000);
    /// assert_eq!(amount.percentage_of(Percent::from_bps(1_000)).cents(), 1_000);
    /// ```
    pub fn percentage_of(&self, percent: Percent) -> Money {
        Money(round_div(
            self.0 as i128 * percent.bps() as i128,
            BPS_SCALE as i128,
        ))
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Example
    /// ```rust
    /// use cpq_core::money::Money;
    /// use cpq_core::types::Percent;
    ///
    /// let subtotal = Money::from_cents(10_000);
    /// let discounted = subtotal.apply_percentage_discount(Percent::from_bps(1_000));
    /// assert_eq!(discounted.cents(), 9_000);
    /// ```
    pub fn apply_percentage_discount(&self, discount: Percent) -> Money {
        *self - self.percentage_of(discount)
    }

    /// Expresses `part` as a percentage of `self`, in basis points.
    ///
    /// Returns zero when `self` is not positive, which is how the margin
    /// engine defines margin on an empty or zero-revenue quote.
    pub fn ratio_of(&self, part: Money) -> Percent {
        if self.0 <= 0 {
            return Percent::zero();
        }
        Percent::from_bps(round_div(
            part.0 as i128 * BPS_SCALE as i128,
            self.0 as i128,
        ))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display; currency formatting belongs to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
