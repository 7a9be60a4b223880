//! # Validation Module
//!
//! Input validation utilities for Keystone CPQ.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Configurator UI                                              │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Publish validator (authoring time)                           │
//! │  ├── Group limits, modifiers, price tiers                              │
//! │  └── Uses the catalog checks in this module                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Quote mutations (runtime)                                    │
//! │  ├── Quantity, discount, price, quote size                             │
//! │  └── Uses the numeric checks in this module                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cpq_core::validation::{validate_currency_code, validate_quantity};
//!
//! validate_currency_code("ILS").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::catalog::{PriceModifier, PriceTier, TierDiscount};
use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Percent, BPS_SCALE};
use crate::{MAX_ITEM_QUANTITY, MAX_QUOTE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an ISO 4217 currency code.
///
/// ## Rules
/// - Exactly three ASCII uppercase letters
///
/// ## Example
/// ```rust
/// use cpq_core::validation::validate_currency_code;
///
/// assert!(validate_currency_code("USD").is_ok());
/// assert!(validate_currency_code("usd").is_err());
/// assert!(validate_currency_code("").is_err());
/// ```
pub fn validate_currency_code(code: &str) -> ValidationResult<()> {
    if code.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter ISO 4217 code".to_string(),
        });
    }

    Ok(())
}

/// Validates a quote line description.
///
/// ## Rules
/// - Must not be empty
/// - At most 500 characters
pub fn validate_description(description: &str) -> ValidationResult<()> {
    let description = description.trim();

    if description.is_empty() {
        return Err(ValidationError::Required {
            field: "description".to_string(),
        });
    }

    if description.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 500,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Quote: Add Line                                                        │
/// │                                                                         │
/// │  Seller enters quantity: 5                                             │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       │                                                                 │
/// │       ├── qty > MAX? → Error: "quantity must be between 1 and ..."     │
/// │       │                                                                 │
/// │       └── OK → Resolve price, add line                                 │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a monetary amount that may not be negative.
///
/// ## Example
/// ```rust
/// use cpq_core::money::Money;
/// use cpq_core::validation::validate_price;
///
/// assert!(validate_price(Money::from_cents(1099), "unit_price").is_ok());
/// assert!(validate_price(Money::zero(), "unit_price").is_ok());
/// assert!(validate_price(Money::from_cents(-100), "unit_price").is_err());
/// ```
pub fn validate_price(amount: Money, field: &str) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a discount percentage.
///
/// ## Rules
/// - Between 0% and 100% inclusive
pub fn validate_discount_percent(discount: Percent) -> ValidationResult<()> {
    if discount.bps() < 0 || discount.bps() > BPS_SCALE {
        return Err(ValidationError::OutOfRange {
            field: "discount_percent".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if i64::from(bps) > BPS_SCALE {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: BPS_SCALE,
        });
    }

    Ok(())
}

/// Validates an identifier that must be a UUID (tenant ids).
///
/// ## Example
/// ```rust
/// use cpq_core::validation::validate_uuid;
///
/// assert!(validate_uuid("00000000-0000-0000-0000-000000000001", "tenant_id").is_ok());
/// assert!(validate_uuid("tenant-1", "tenant_id").is_err());
/// ```
pub fn validate_uuid(id: &str, field: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates quote size before adding another line.
///
/// ## Rules
/// - Must not exceed MAX_QUOTE_ITEMS
pub fn validate_quote_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_QUOTE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "quote items".to_string(),
            min: 0,
            max: MAX_QUOTE_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Catalog Validators
// =============================================================================

/// Validates a group's selection bounds.
///
/// ## Rules
/// - `max_selections`, when set, must be at least `min_selections`
/// - `max_selections` of zero makes the group unusable
pub fn validate_group_limits(min: u32, max: Option<u32>) -> ValidationResult<()> {
    if let Some(max) = max {
        if max == 0 {
            return Err(ValidationError::MustBePositive {
                field: "max_selections".to_string(),
            });
        }
        if max < min {
            return Err(ValidationError::OutOfRange {
                field: "max_selections".to_string(),
                min: i64::from(min),
                max: i64::from(u32::MAX),
            });
        }
    }

    Ok(())
}

/// Validates an option's price modifier.
///
/// Replacement prices must not be negative. Additive credits may be.
pub fn validate_price_modifier(modifier: &PriceModifier) -> ValidationResult<()> {
    match modifier {
        PriceModifier::Replace(amount) => validate_price(*amount, "replace price"),
        PriceModifier::Add(_) | PriceModifier::Multiply(_) => Ok(()),
    }
}

/// Validates a price tier's quantity band and discount.
pub fn validate_price_tier(tier: &PriceTier) -> ValidationResult<()> {
    if tier.quantity_min < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity_min".to_string(),
        });
    }

    if let Some(max) = tier.quantity_max {
        if max < tier.quantity_min {
            return Err(ValidationError::OutOfRange {
                field: "quantity_max".to_string(),
                min: tier.quantity_min,
                max: i64::MAX,
            });
        }
    }

    match tier.discount {
        TierDiscount::Percentage(percent) => validate_discount_percent(percent),
        TierDiscount::FixedAmount(amount) => validate_price(amount, "fixed discount"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
