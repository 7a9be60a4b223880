//! # cpq-core: Pure Configure-Price-Quote Logic for Keystone CPQ
//!
//! This crate is the **heart** of Keystone CPQ. It contains the rule
//! evaluator, the configured-price math, quote aggregation and publish
//! validation as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Keystone CPQ Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Configurator / Quote UI                      │   │
//! │  │    Pick options ──► See violations ──► Add to quote ──► Send   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    cpq-engine (async façade)                    │   │
//! │  │    sessions, price resolver, quote builder, stores, config     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                ★ cpq-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │ catalog  │ │  rules   │ │ pricing  │ │  quote   │          │   │
//! │  │   │ Template │ │ evaluate │ │ modifiers│ │ aggregate│          │   │
//! │  │   │ Groups   │ │ cycles   │ │ tiers    │ │ margin   │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │selection │ │price_list│ │ publish  │ │validation│          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`catalog`] - Template, option groups, options, rules, presets
//! - [`selection`] - Per-session selection state and its mutations
//! - [`rules`] - Rule evaluator (violations, hidden/blocked sets, auto-select)
//! - [`pricing`] - Option modifier chain and quantity price tiers
//! - [`price_list`] - Tiered price lists (general and customer-scoped)
//! - [`quote`] - Quote lines and totals (tax, margin, recurring)
//! - [`publish`] - Authoring checks run before a template goes live
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`types`] - Rate newtypes and shared enums
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in agorot/cents (i64)
//! 4. **Violations Are Data**: Expected business conditions are returned, not thrown
//!
//! ## Example Usage
//!
//! ```rust
//! use cpq_core::money::Money;
//! use cpq_core::types::TaxRate;
//!
//! let price = Money::from_cents(1099); // 10.99
//!
//! // 17% VAT, rounded half away from zero
//! let tax = price.calculate_tax(TaxRate::default());
//! assert_eq!(tax.cents(), 187);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod error;
pub mod money;
pub mod price_list;
pub mod pricing;
pub mod publish;
pub mod quote;
pub mod rules;
pub mod selection;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use catalog::{Catalog, TemplateRecord};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use quote::{Quote, QuoteItem, QuoteTotals};
pub use rules::{evaluate, EvaluationResult};
pub use selection::{Selection, SelectionState};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default tenant ID for single-tenant deployments.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Default quote currency (ISO 4217).
pub const DEFAULT_CURRENCY: &str = "ILS";

/// Default VAT applied to quote totals: 17%.
pub const DEFAULT_TAX_RATE_BPS: u32 = 1700;

/// Default margin floor below which a quote needs approval: 20%.
pub const DEFAULT_MIN_MARGIN_BPS: i64 = 2000;

/// Maximum lines allowed in a single quote.
pub const MAX_QUOTE_ITEMS: usize = 500;

/// Maximum quantity on a single quote line or configuration.
///
/// ## Business Reason
/// Catches typos (100000 instead of 100) before they reach a customer.
pub const MAX_ITEM_QUANTITY: i64 = 99_999;
