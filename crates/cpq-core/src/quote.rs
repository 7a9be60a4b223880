//! # Quote
//!
//! Quote lines, the quote being built, and the totals aggregator.
//!
//! ## Totals Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         aggregate(items)                                │
//! │                                                                         │
//! │  one-time lines ────────────────────────┐     recurring lines           │
//! │    subtotal        = Σ qty × unit       │       monthly   = Σ line      │
//! │    after discounts = Σ line_total       │       quarterly = Σ line      │
//! │    discount_total  = subtotal − after   │       yearly    = Σ line      │
//! │    tax             = after × rate       │                               │
//! │    grand_total     = after + tax        │   (never part of grand_total) │
//! │    total_cost      = Σ qty × cost       │                               │
//! │    margin          = (after − cost) / after                             │
//! │    requires_approval = margin < floor (and the quote has lines)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{BillingFrequency, Percent, PriceSource, TaxRate};
use crate::validation::{
    validate_currency_code, validate_description, validate_discount_percent, validate_price,
    validate_quantity, validate_quote_size,
};

// =============================================================================
// Quote Item
// =============================================================================

/// One line of a quote.
///
/// ## Design Notes
/// - `unit_price` and `cost_price` are frozen when the line is added; later
///   price list changes do not touch an open quote
/// - `line_total` is a snapshot kept in sync by every setter
/// - `price_source` records where `unit_price` came from so the UI can flag
///   lines that did not use a customer price list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuoteItem {
    pub id: String,
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub discount_percent: Percent,
    pub line_total: Money,
    #[serde(default)]
    pub cost_price: Money,
    pub price_source: PriceSource,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub billing_frequency: Option<BillingFrequency>,
}

impl QuoteItem {
    /// Creates a one-time line with a fresh ID.
    pub fn new(
        product_id: Option<String>,
        description: impl Into<String>,
        quantity: i64,
        unit_price: Money,
        cost_price: Money,
        price_source: PriceSource,
    ) -> CoreResult<Self> {
        let description = description.into();
        validate_description(&description)?;
        validate_quantity(quantity)?;
        validate_price(unit_price, "unit_price")?;
        validate_price(cost_price, "cost_price")?;

        Ok(QuoteItem {
            id: Uuid::new_v4().to_string(),
            product_id,
            description,
            quantity,
            unit_price,
            discount_percent: Percent::zero(),
            line_total: line_total(quantity, unit_price, Percent::zero()),
            cost_price,
            price_source,
            is_recurring: false,
            billing_frequency: None,
        })
    }

    /// Marks the line as recurring at the given cadence.
    pub fn recurring(mut self, frequency: BillingFrequency) -> Self {
        self.is_recurring = true;
        self.billing_frequency = Some(frequency);
        self
    }

    /// Applies a line discount.
    pub fn with_discount(mut self, discount: Percent) -> CoreResult<Self> {
        self.set_discount(discount)?;
        Ok(self)
    }

    pub fn set_quantity(&mut self, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;
        self.quantity = quantity;
        self.recompute();
        Ok(())
    }

    pub fn set_discount(&mut self, discount: Percent) -> CoreResult<()> {
        validate_discount_percent(discount)?;
        self.discount_percent = discount;
        self.recompute();
        Ok(())
    }

    /// Seller override; the source becomes `manual`.
    pub fn override_unit_price(&mut self, unit_price: Money) -> CoreResult<()> {
        validate_price(unit_price, "unit_price")?;
        self.unit_price = unit_price;
        self.price_source = PriceSource::Manual;
        self.recompute();
        Ok(())
    }

    /// `quantity × unit_price`, before the line discount.
    pub fn gross(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// `quantity × cost_price`.
    pub fn cost_total(&self) -> Money {
        self.cost_price.multiply_quantity(self.quantity)
    }

    /// Checks an item that arrived from outside (e.g. deserialized).
    pub fn validate(&self) -> CoreResult<()> {
        validate_description(&self.description)?;
        validate_quantity(self.quantity)?;
        validate_price(self.unit_price, "unit_price")?;
        validate_price(self.cost_price, "cost_price")?;
        validate_discount_percent(self.discount_percent)?;
        if self.is_recurring && self.billing_frequency.is_none() {
            return Err(ValidationError::Required {
                field: "billing_frequency".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn recompute(&mut self) {
        self.line_total = line_total(self.quantity, self.unit_price, self.discount_percent);
    }
}

fn line_total(quantity: i64, unit_price: Money, discount: Percent) -> Money {
    unit_price
        .multiply_quantity(quantity)
        .apply_percentage_discount(discount)
}

// =============================================================================
// Totals
// =============================================================================

/// Recurring revenue per billing cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecurringTotals {
    pub monthly: Money,
    pub quarterly: Money,
    pub yearly: Money,
}

/// Result of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuoteTotals {
    pub item_count: usize,
    pub subtotal: Money,
    pub discount_total: Money,
    pub total_after_discounts: Money,
    pub tax_rate: TaxRate,
    pub tax_total: Money,
    pub grand_total: Money,
    pub total_cost: Money,
    pub margin_pct: Percent,
    pub min_margin_pct: Percent,
    pub requires_approval: bool,
    pub recurring: RecurringTotals,
}

/// Aggregates quote lines into totals.
///
/// Pure: no rounding surprises beyond the single tax rounding on the
/// discounted one-time total.
///
/// ## Example
/// ```rust
/// use cpq_core::money::Money;
/// use cpq_core::quote::{aggregate, QuoteItem};
/// use cpq_core::types::{BillingFrequency, Percent, PriceSource, TaxRate};
///
/// let items = vec![
///     QuoteItem::new(None, "Desk", 2, Money::from_major(50), Money::from_major(30), PriceSource::Manual).unwrap(),
///     QuoteItem::new(None, "Support", 1, Money::from_major(80), Money::zero(), PriceSource::Manual)
///         .unwrap()
///         .recurring(BillingFrequency::Monthly),
/// ];
///
/// let totals = aggregate(&items, TaxRate::from_bps(1700), Percent::from_whole(20));
/// assert_eq!(totals.subtotal, Money::from_major(100));
/// assert_eq!(totals.grand_total, Money::from_major(117));
/// assert_eq!(totals.margin_pct, Percent::from_whole(40));
/// assert_eq!(totals.recurring.monthly, Money::from_major(80));
/// ```
pub fn aggregate(items: &[QuoteItem], tax_rate: TaxRate, min_margin: Percent) -> QuoteTotals {
    let mut subtotal = Money::zero();
    let mut after_discounts = Money::zero();
    let mut total_cost = Money::zero();
    let mut recurring = RecurringTotals::default();

    for item in items {
        if item.is_recurring {
            // A recurring line without a cadence is billed monthly.
            match item.billing_frequency.unwrap_or(BillingFrequency::Monthly) {
                BillingFrequency::Monthly => recurring.monthly += item.line_total,
                BillingFrequency::Quarterly => recurring.quarterly += item.line_total,
                BillingFrequency::Yearly => recurring.yearly += item.line_total,
            }
            continue;
        }
        subtotal += item.gross();
        after_discounts += item.line_total;
        total_cost += item.cost_total();
    }

    let tax_total = after_discounts.calculate_tax(tax_rate);
    let margin_pct = after_discounts.ratio_of(after_discounts - total_cost);

    QuoteTotals {
        item_count: items.len(),
        subtotal,
        discount_total: subtotal - after_discounts,
        total_after_discounts: after_discounts,
        tax_rate,
        tax_total,
        grand_total: after_discounts + tax_total,
        total_cost,
        margin_pct,
        min_margin_pct: min_margin,
        requires_approval: !items.is_empty() && margin_pct < min_margin,
        recurring,
    }
}

// =============================================================================
// Quote
// =============================================================================

/// A quote under construction.
///
/// ## Invariants
/// - Lines keep insertion order
/// - At most `MAX_QUOTE_ITEMS` lines
/// - Every line passes [`QuoteItem::validate`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: String,
    pub currency: String,
    pub customer_id: Option<String>,
    items: Vec<QuoteItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Creates an empty quote.
    pub fn new(currency: &str) -> CoreResult<Self> {
        validate_currency_code(currency)?;
        let now = Utc::now();
        Ok(Quote {
            id: Uuid::new_v4().to_string(),
            currency: currency.to_string(),
            customer_id: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn for_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Appends a line and returns its ID.
    pub fn add_item(&mut self, item: QuoteItem) -> CoreResult<String> {
        if validate_quote_size(self.items.len()).is_err() {
            return Err(CoreError::QuoteTooLarge {
                max: crate::MAX_QUOTE_ITEMS,
            });
        }
        item.validate()?;

        let id = item.id.clone();
        self.items.push(item);
        self.touch();
        Ok(id)
    }

    /// Changes a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, item_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(item_id).map(|_| ());
        }
        self.item_mut(item_id)?.set_quantity(quantity)?;
        self.touch();
        Ok(())
    }

    pub fn update_discount(&mut self, item_id: &str, discount: Percent) -> CoreResult<()> {
        self.item_mut(item_id)?.set_discount(discount)?;
        self.touch();
        Ok(())
    }

    pub fn override_unit_price(&mut self, item_id: &str, unit_price: Money) -> CoreResult<()> {
        self.item_mut(item_id)?.override_unit_price(unit_price)?;
        self.touch();
        Ok(())
    }

    /// Removes and returns a line.
    pub fn remove_item(&mut self, item_id: &str) -> CoreResult<QuoteItem> {
        let index = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| CoreError::QuoteItemNotFound(item_id.to_string()))?;
        let item = self.items.remove(index);
        self.touch();
        Ok(item)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    pub fn items(&self) -> &[QuoteItem] {
        &self.items
    }

    pub fn item(&self, item_id: &str) -> Option<&QuoteItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn totals(&self, tax_rate: TaxRate, min_margin: Percent) -> QuoteTotals {
        aggregate(&self.items, tax_rate, min_margin)
    }

    fn item_mut(&mut self, item_id: &str) -> CoreResult<&mut QuoteItem> {
        self.items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| CoreError::QuoteItemNotFound(item_id.to_string()))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
