//! # Domain Types
//!
//! Rate newtypes and small enums shared by every engine in the crate.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Shared Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │    Percent      │   │   Multiplier    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  bps (i64)      │   │  1/10000 (u32)  │       │
//! │  │  1700 = 17%     │   │  4000 = 40%     │   │  11000 = ×1.1   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │  PriceSource    │   │BillingFrequency │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  Bom, Cpq       │   │  Monthly        │                             │
//! │  │  CustomerList   │   │  Quarterly      │                             │
//! │  │  GeneralList    │   │  Yearly         │                             │
//! │  │  BasePrice      │   └─────────────────┘                             │
//! │  │  Manual         │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Basis points per whole (10000 bps = 100%).
pub const BPS_SCALE: i64 = 10_000;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1700 bps = 17% (Israeli VAT, the default quote tax rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for configuration input).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::from_bps(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Percent
// =============================================================================

/// A signed percentage in basis points.
///
/// Used for line discounts (0-100%), price tier discounts, price list item
/// discounts, and margins (which go negative when a quote sells below cost).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percent(i64);

impl Percent {
    #[inline]
    pub const fn from_bps(bps: i64) -> Self {
        Percent(bps)
    }

    /// Creates a percent from a whole-number percentage (40 → 40%).
    #[inline]
    pub const fn from_whole(pct: i64) -> Self {
        Percent(pct * 100)
    }

    /// Creates a percent from a fractional percentage (12.5 → 12.5%).
    pub fn from_percentage(pct: f64) -> Self {
        Percent((pct * 100.0).round() as i64)
    }

    #[inline]
    pub const fn bps(&self) -> i64 {
        self.0
    }

    /// Returns the value as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    #[inline]
    pub const fn full() -> Self {
        Percent(BPS_SCALE)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}%", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

// =============================================================================
// Multiplier
// =============================================================================

/// A non-negative multiplicative factor in ten-thousandths.
///
/// `10000` is ×1.0 (identity), `11000` is ×1.1, `0` zeroes the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Multiplier(u32);

impl Multiplier {
    #[inline]
    pub const fn from_ten_thousandths(value: u32) -> Self {
        Multiplier(value)
    }

    /// Creates a multiplier from a decimal factor (1.1 → ×1.1).
    ///
    /// Negative inputs clamp to zero; the publish validator rejects them
    /// before they reach a catalog.
    pub fn from_factor(factor: f64) -> Self {
        Multiplier((factor.max(0.0) * BPS_SCALE as f64).round() as u32)
    }

    #[inline]
    pub const fn ten_thousandths(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn identity() -> Self {
        Multiplier(BPS_SCALE as u32)
    }

    #[inline]
    pub fn factor(&self) -> f64 {
        self.0 as f64 / BPS_SCALE as f64
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Multiplier::identity()
    }
}

// =============================================================================
// Price Source
// =============================================================================

/// Provenance of a quote line's unit price.
///
/// Rendered next to the price so a seller can see when a price did not come
/// from a customer-specific list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Computed from a configured product's bill of materials.
    Bom,
    /// Computed by the configurator (template + option modifiers).
    Cpq,
    /// Customer-scoped price list tier.
    CustomerList,
    /// General price list tier.
    GeneralList,
    /// The product's own list price.
    BasePrice,
    /// Typed in by the seller.
    Manual,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Bom => write!(f, "bom"),
            PriceSource::Cpq => write!(f, "cpq"),
            PriceSource::CustomerList => write!(f, "customer_list"),
            PriceSource::GeneralList => write!(f, "general_list"),
            PriceSource::BasePrice => write!(f, "base_price"),
            PriceSource::Manual => write!(f, "manual"),
        }
    }
}

// =============================================================================
// Billing Frequency
// =============================================================================

/// Billing cadence for recurring quote lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BillingFrequency {
    Monthly,
    Quarterly,
    Yearly,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(1700);
        assert_eq!(rate.bps(), 1700);
        assert!((rate.percentage() - 17.0).abs() < 0.001);
    }

    #[test]
    fn test_tax_rate_default_is_seventeen_percent() {
        assert_eq!(TaxRate::default().bps(), 1700);
    }

    #[test]
    fn test_percent_constructors() {
        assert_eq!(Percent::from_whole(40).bps(), 4000);
        assert_eq!(Percent::from_percentage(12.5).bps(), 1250);
        assert_eq!(Percent::from_bps(-250).to_string(), "-2.50%");
        assert_eq!(Percent::from_whole(40).to_string(), "40.00%");
    }

    #[test]
    fn test_multiplier_from_factor() {
        assert_eq!(Multiplier::from_factor(1.1).ten_thousandths(), 11_000);
        assert_eq!(Multiplier::from_factor(2.0).ten_thousandths(), 20_000);
        assert_eq!(Multiplier::from_factor(-1.0).ten_thousandths(), 0);
        assert_eq!(Multiplier::default(), Multiplier::identity());
    }

    #[test]
    fn test_price_source_serializes_snake_case() {
        let json = serde_json::to_string(&PriceSource::CustomerList).unwrap();
        assert_eq!(json, "\"customer_list\"");
        assert_eq!(PriceSource::GeneralList.to_string(), "general_list");
    }
}
