//! # Price Lists
//!
//! Tenant-wide and customer-specific price lists with quantity tiers.
//!
//! ```text
//! PriceList "Acme Corp 2026" (customer)
//!   product "desk"   min_qty 1   → 500.00
//!                    min_qty 10  → 450.00  (-5%  → 427.50 effective)
//!                    min_qty 50  → 400.00
//!
//! best_tier("desk", 12) → min_qty 10
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Percent;
use crate::validation::{validate_currency_code, validate_discount_percent, validate_price};

/// Who a price list applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum PriceListScope {
    General,
    Customer { customer_id: String },
}

/// One quantity tier of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceListItem {
    pub product_id: String,
    /// Tier threshold (inclusive, at least 1).
    pub min_quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub discount_percent: Percent,
}

impl PriceListItem {
    /// Unit price after the item's own discount.
    pub fn effective_price(&self) -> Money {
        self.unit_price.apply_percentage_discount(self.discount_percent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceList {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub scope: PriceListScope,
    #[serde(default)]
    pub items: Vec<PriceListItem>,
}

impl PriceList {
    /// Validates the list and sorts items by `(product_id, min_quantity)`.
    ///
    /// ## Errors
    /// - Bad currency code
    /// - `min_quantity < 1`, negative price, discount outside 0-100%
    /// - Two tiers of one product with the same threshold
    pub fn normalize(mut self) -> CoreResult<Self> {
        validate_currency_code(&self.currency)?;

        for item in &self.items {
            if item.min_quantity < 1 {
                return Err(ValidationError::MustBePositive {
                    field: "min_quantity".to_string(),
                }
                .into());
            }
            validate_price(item.unit_price, "unit_price")?;
            validate_discount_percent(item.discount_percent)?;
        }

        self.items.sort_by(|a, b| {
            a.product_id
                .cmp(&b.product_id)
                .then(a.min_quantity.cmp(&b.min_quantity))
        });

        if let Some(pair) = self
            .items
            .windows(2)
            .find(|pair| pair[0].product_id == pair[1].product_id && pair[0].min_quantity == pair[1].min_quantity)
        {
            return Err(ValidationError::Duplicate {
                field: "price tier".to_string(),
                value: format!("{}@{}", pair[1].product_id, pair[1].min_quantity),
            }
            .into());
        }

        Ok(self)
    }

    pub fn is_customer_scoped(&self) -> bool {
        matches!(self.scope, PriceListScope::Customer { .. })
    }

    /// The tier with the largest `min_quantity ≤ quantity`.
    ///
    /// Works on un-normalized lists too; among equal thresholds the last one
    /// listed wins.
    pub fn best_tier(&self, product_id: &str, quantity: i64) -> Option<&PriceListItem> {
        self.items
            .iter()
            .filter(|item| item.product_id == product_id && item.min_quantity <= quantity)
            .max_by_key(|item| item.min_quantity)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use assert_matches::assert_matches;

    fn item(product_id: &str, min_quantity: i64, cents: i64) -> PriceListItem {
        PriceListItem {
            product_id: product_id.to_string(),
            min_quantity,
            unit_price: Money::from_cents(cents),
            discount_percent: Percent::zero(),
        }
    }

    fn list(items: Vec<PriceListItem>) -> PriceList {
        PriceList {
            id: "pl-1".to_string(),
            name: "Acme".to_string(),
            currency: "ILS".to_string(),
            scope: PriceListScope::Customer {
                customer_id: "acme".to_string(),
            },
            items,
        }
    }

    #[test]
    fn test_best_tier() {
        let list = list(vec![
            item("desk", 50, 40_000),
            item("desk", 1, 50_000),
            item("desk", 10, 45_000),
            item("chair", 1, 9_000),
        ]);

        assert_eq!(list.best_tier("desk", 1).unwrap().min_quantity, 1);
        assert_eq!(list.best_tier("desk", 12).unwrap().min_quantity, 10);
        assert_eq!(list.best_tier("desk", 500).unwrap().min_quantity, 50);
        assert!(list.best_tier("lamp", 5).is_none());
        assert!(list.is_customer_scoped());
    }

    #[test]
    fn test_best_tier_outlives_lookup_key() {
        let list = list(vec![item("desk", 1, 50_000), item("desk", 10, 45_000)]);
        let tier = {
            let key = format!("de{}", "sk");
            list.best_tier(&key, 11)
        };
        assert_eq!(tier.map(|t| t.unit_price), Some(Money::from_cents(45_000)));
    }

    #[test]
    fn test_tier_threshold_is_monotonic() {
        let list = list(vec![item("desk", 1, 500), item("desk", 10, 450), item("desk", 50, 400)]);
        let mut previous = 0;
        for qty in 1..=100 {
            let min = list.best_tier("desk", qty).unwrap().min_quantity;
            assert!(min >= previous);
            previous = min;
        }
    }

    #[test]
    fn test_effective_price_applies_item_discount() {
        let mut tier = item("desk", 10, 45_000);
        tier.discount_percent = Percent::from_whole(5);
        assert_eq!(tier.effective_price(), Money::from_cents(42_750));
    }

    #[test]
    fn test_normalize_sorts() {
        let list = list(vec![item("desk", 10, 450), item("chair", 1, 90), item("desk", 1, 500)])
            .normalize()
            .unwrap();
        let keys: Vec<(&str, i64)> = list
            .items
            .iter()
            .map(|i| (i.product_id.as_str(), i.min_quantity))
            .collect();
        assert_eq!(keys, vec![("chair", 1), ("desk", 1), ("desk", 10)]);
    }

    #[test]
    fn test_normalize_rejects_duplicates_and_bad_values() {
        assert_matches!(
            list(vec![item("desk", 10, 450), item("desk", 10, 400)]).normalize(),
            Err(CoreError::Validation(ValidationError::Duplicate { .. }))
        );
        assert!(list(vec![item("desk", 0, 450)]).normalize().is_err());
        assert!(list(vec![item("desk", 1, -1)]).normalize().is_err());
    }
}
