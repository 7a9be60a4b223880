//! # Configured Price
//!
//! Turns a template plus a selection into a unit price and line total.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   start     = replace modifier ?? template.base_price                   │
//! │   subtotal  = (start + Σ add) × Π multiply        (round at each ×)     │
//! │   discount  = best price_tier for quantity        (per unit, ≤ subtotal)│
//! │   unit      = subtotal − discount                                       │
//! │   total     = unit × quantity                                           │
//! │                                                                         │
//! │   base 100, add +20, multiply ×1.1, qty 3                               │
//! │     → subtotal 132.00, unit 132.00, total 396.00                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Modifiers are applied in `(group_id, option_id)` order. Only the order of
//! multiplications can matter (through per-step rounding) and that order is
//! fixed, so the result never depends on the order options were clicked.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::catalog::{Catalog, ConfigurationRule, PriceModifier, PriceTier, RuleKind, RuleType, TierDiscount};
use crate::error::CoreResult;
use crate::money::Money;
use crate::selection::Selection;
use crate::validation::validate_quantity;

// =============================================================================
// Modifier Chain
// =============================================================================

/// Applies price modifiers to a base price: replace, then add, then multiply.
///
/// When more than one `replace` is supplied the last one wins. The publish
/// validator rejects catalogs where that can happen, so a published catalog
/// yields at most one.
///
/// [`configured_price`] passes modifiers in `(group_id, option_id)` order, so
/// for an unpublished catalog the tie goes to the highest group ID, not to
/// the group with the highest display priority.
///
/// ## Example
/// ```rust
/// use cpq_core::catalog::PriceModifier;
/// use cpq_core::money::Money;
/// use cpq_core::pricing::apply_modifiers;
/// use cpq_core::types::Multiplier;
///
/// let modifiers = [
///     PriceModifier::Multiply(Multiplier::from_factor(2.0)),
///     PriceModifier::Add(Money::from_major(10)),
/// ];
/// // add then multiply, whatever the input order: (100 + 10) × 2
/// assert_eq!(apply_modifiers(Money::from_major(100), &modifiers), Money::from_major(220));
/// ```
pub fn apply_modifiers<'m>(base: Money, modifiers: impl IntoIterator<Item = &'m PriceModifier>) -> Money {
    let modifiers: Vec<&PriceModifier> = modifiers.into_iter().collect();

    let start = modifiers
        .iter()
        .filter_map(|m| match m {
            PriceModifier::Replace(amount) => Some(*amount),
            _ => None,
        })
        .last()
        .unwrap_or(base);

    let added: Money = modifiers
        .iter()
        .filter_map(|m| match m {
            PriceModifier::Add(amount) => Some(*amount),
            _ => None,
        })
        .sum();

    modifiers
        .iter()
        .filter_map(|m| match m {
            PriceModifier::Multiply(factor) => Some(*factor),
            _ => None,
        })
        .fold(start + added, |price, factor| price.scale(factor))
}

// =============================================================================
// Price Tiers
// =============================================================================

/// The `price_tier` rule that applies to a quantity.
///
/// Picks the largest `quantity_min ≤ quantity` among active tiers whose
/// `quantity_max` (if any) is not exceeded. Ties go to the lower priority,
/// then the lower rule ID.
pub fn best_price_tier(catalog: &Catalog, quantity: i64) -> Option<(&ConfigurationRule, &PriceTier)> {
    catalog
        .active_rules_of(RuleType::PriceTier)
        .into_iter()
        .filter_map(|rule| match &rule.kind {
            RuleKind::PriceTier { tier } if tier.applies_to(quantity) => Some((rule, tier)),
            _ => None,
        })
        // active_rules_of is already in (priority, id) order; keep the first
        // of equal thresholds.
        .fold(None, |best: Option<(&ConfigurationRule, &PriceTier)>, candidate| match best {
            Some((_, tier)) if tier.quantity_min >= candidate.1.quantity_min => best,
            _ => Some(candidate),
        })
}

/// Per-unit discount a tier grants on `unit_price`, clamped to `[0, unit_price]`.
pub fn tier_discount(tier: &PriceTier, unit_price: Money) -> Money {
    let ceiling = unit_price.non_negative();
    let discount = match tier.discount {
        TierDiscount::Percentage(percent) => ceiling.percentage_of(percent),
        TierDiscount::FixedAmount(amount) => amount,
    };
    discount.non_negative().min(ceiling)
}

// =============================================================================
// Configured Price
// =============================================================================

/// One selected option's contribution, for the price breakdown UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ModifierLine {
    pub group_id: String,
    pub option_id: String,
    pub option_name: String,
    pub modifier: PriceModifier,
}

/// Price of one configured line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConfiguredPrice {
    pub base_price: Money,
    /// Set when a `replace` modifier overrode the base price.
    pub replaced_base: Option<Money>,
    /// Sum of `add` modifiers.
    pub options_total: Money,
    /// Unit price after all modifiers, before the tier discount.
    pub subtotal: Money,
    pub tier_rule_id: Option<String>,
    /// Per-unit tier discount.
    pub tier_discount: Money,
    pub unit_price: Money,
    pub quantity: i64,
    pub total: Money,
    pub breakdown: Vec<ModifierLine>,
}

/// Computes the configured unit price and line total.
///
/// ## Errors
/// - Quantity out of range
/// - Selection that does not match the catalog
pub fn configured_price(catalog: &Catalog, selection: &Selection, quantity: i64) -> CoreResult<ConfiguredPrice> {
    validate_quantity(quantity)?;
    selection.validate_against(catalog)?;

    let breakdown: Vec<ModifierLine> = selection
        .iter()
        .filter_map(|(group_id, option_id)| {
            catalog.option(option_id).map(|option| ModifierLine {
                group_id: group_id.to_string(),
                option_id: option_id.to_string(),
                option_name: option.name.clone(),
                modifier: option.price_modifier,
            })
        })
        .collect();

    let base_price = catalog.template().base_price;
    let replaced_base = breakdown
        .iter()
        .filter_map(|line| match line.modifier {
            PriceModifier::Replace(amount) => Some(amount),
            _ => None,
        })
        .last();
    let options_total: Money = breakdown
        .iter()
        .filter_map(|line| match line.modifier {
            PriceModifier::Add(amount) => Some(amount),
            _ => None,
        })
        .sum();
    let subtotal = apply_modifiers(base_price, breakdown.iter().map(|line| &line.modifier));

    let (tier_rule_id, tier_discount) = match best_price_tier(catalog, quantity) {
        Some((rule, tier)) => (Some(rule.id.clone()), tier_discount(tier, subtotal)),
        None => (None, Money::zero()),
    };
    let unit_price = subtotal - tier_discount;

    Ok(ConfiguredPrice {
        base_price,
        replaced_base,
        options_total,
        subtotal,
        tier_rule_id,
        tier_discount,
        unit_price,
        quantity,
        total: unit_price.multiply_quantity(quantity),
        breakdown,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
