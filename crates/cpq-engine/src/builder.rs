//! # Quote Builder
//!
//! Turns products and finished configurations into priced quote lines.
//!
//! ```text
//! add_product("chair", 2)            add_configured(&session)
//!        │                                  │ summary(): must be valid
//!        │                                  │ configured unit price + cost
//!        ▼                                  ▼
//!   PriceResolver::resolve  ◄── PriceRequest { precomputed: cpq }
//!        │
//!        ▼
//!   QuoteItem { unit_price, cost_price, price_source } ──► Quote
//!
//! totals() = aggregate(items, tax_rate, min_margin) from EngineConfig
//! ```
//!
//! Unit prices are frozen when a line is added. Changing a line's quantity
//! later does not re-run price list tiers.

use std::sync::Arc;
use tracing::{debug, info};

use cpq_core::validation::validate_quantity;
use cpq_core::{BillingFrequency, CoreError, Money, Percent, PriceSource, Quote, QuoteItem, QuoteTotals};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::resolver::{PrecomputedPrice, PriceRequest, PriceResolutionWarning, PriceResolver, ResolvedPrice};
use crate::session::ConfigurationSession;
use crate::store::PricingStore;

/// Builds one quote with its own resolver.
pub struct QuoteBuilder<S: ?Sized> {
    config: EngineConfig,
    resolver: PriceResolver<S>,
    quote: Quote,
}

impl<S: PricingStore + ?Sized> QuoteBuilder<S> {
    pub fn new(config: EngineConfig, store: Arc<S>) -> EngineResult<Self> {
        config.validate()?;

        let mut resolver = PriceResolver::new(store, config.tenant_id());
        if !config.pricing.memoize {
            resolver = resolver.without_memo();
        }
        let quote = Quote::new(config.currency())?;

        Ok(Self {
            config,
            resolver,
            quote,
        })
    }

    /// Prices subsequent lines with the customer's price list.
    pub fn for_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.quote = self.quote.for_customer(customer_id);
        self
    }

    // =========================================================================
    // Adding Lines
    // =========================================================================

    /// Adds a one-time product line priced by the resolver.
    pub async fn add_product(&mut self, product_id: &str, description: &str, quantity: i64) -> EngineResult<String> {
        let item = self.product_item(product_id, description, quantity).await?;
        self.push(item)
    }

    /// Adds a recurring product line (support contracts, subscriptions).
    pub async fn add_recurring(
        &mut self,
        product_id: &str,
        description: &str,
        quantity: i64,
        frequency: BillingFrequency,
    ) -> EngineResult<String> {
        let item = self
            .product_item(product_id, description, quantity)
            .await?
            .recurring(frequency);
        self.push(item)
    }

    /// Adds a configured product at the session's quantity.
    ///
    /// ## Errors
    /// - [`EngineError::InvalidConfiguration`] while the evaluation reports
    ///   violations
    /// - Quote full
    pub async fn add_configured(&mut self, session: &ConfigurationSession) -> EngineResult<String> {
        self.ensure_capacity()?;

        let summary = session.summary()?;
        if !summary.is_valid() {
            return Err(EngineError::InvalidConfiguration {
                template_id: summary.template_id,
                violations: summary.evaluation.violations.len(),
            });
        }

        let component_products: Vec<String> = summary
            .evaluation
            .selection
            .iter()
            .filter_map(|(_, option_id)| session.catalog().option(option_id))
            .filter_map(|option| option.product_id.clone())
            .collect();

        // Per-unit cost: the template's own product plus linked components.
        let mut cost_price = self
            .resolver
            .product_cost(&summary.template_id)
            .await
            .unwrap_or_else(Money::zero);
        for product_id in &component_products {
            if let Some(cost) = self.resolver.product_cost(product_id).await {
                cost_price += cost;
            }
        }

        let unit_price = summary.price.unit_price;
        let request = self
            .request(&summary.template_id, summary.price.quantity)
            .with_precomputed(PrecomputedPrice {
                unit_price,
                source: PriceSource::Cpq,
                cost_price: Some(cost_price),
            })
            .with_fallback(unit_price);
        let resolved = self.resolver.resolve(&request).await;

        let item = QuoteItem::new(
            Some(summary.template_id.clone()),
            session.describe(&summary.evaluation.selection),
            summary.price.quantity,
            resolved.effective_price,
            resolved.cost_price,
            resolved.source,
        )?;
        self.push(item)
    }

    // =========================================================================
    // Editing Lines
    // =========================================================================

    /// Zero removes the line.
    pub fn update_quantity(&mut self, item_id: &str, quantity: i64) -> EngineResult<()> {
        self.quote.update_quantity(item_id, quantity)?;
        debug!(quote_id = %self.quote.id, item_id, quantity, "Quote line quantity updated");
        Ok(())
    }

    pub fn update_discount(&mut self, item_id: &str, discount: Percent) -> EngineResult<()> {
        self.quote.update_discount(item_id, discount)?;
        debug!(quote_id = %self.quote.id, item_id, %discount, "Quote line discount updated");
        Ok(())
    }

    pub fn override_unit_price(&mut self, item_id: &str, unit_price: Money) -> EngineResult<()> {
        self.quote.override_unit_price(item_id, unit_price)?;
        debug!(quote_id = %self.quote.id, item_id, %unit_price, "Quote line price overridden");
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: &str) -> EngineResult<QuoteItem> {
        let item = self.quote.remove_item(item_id)?;
        debug!(quote_id = %self.quote.id, item_id, "Quote line removed");
        Ok(item)
    }

    // =========================================================================
    // Results
    // =========================================================================

    pub fn totals(&self) -> QuoteTotals {
        self.quote
            .totals(self.config.tax_rate(), self.config.min_margin())
    }

    pub fn quote(&self) -> &Quote {
        &self.quote
    }

    /// Every price lookup that fell back while building this quote.
    pub fn warnings(&self) -> &[PriceResolutionWarning] {
        self.resolver.warnings()
    }

    pub fn finish(self) -> Quote {
        info!(
            quote_id = %self.quote.id,
            items = self.quote.item_count(),
            "Quote built"
        );
        self.quote
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn request(&self, product_id: &str, quantity: i64) -> PriceRequest {
        let request = PriceRequest::new(product_id, quantity);
        match &self.quote.customer_id {
            Some(customer_id) => request.for_customer(customer_id.clone()),
            None => request,
        }
    }

    async fn product_item(&mut self, product_id: &str, description: &str, quantity: i64) -> EngineResult<QuoteItem> {
        self.ensure_capacity()?;
        validate_quantity(quantity)?;

        let request = self.request(product_id, quantity);
        let resolved = self.resolver.resolve(&request).await;
        Ok(line_from(product_id, description, quantity, &resolved)?)
    }

    fn ensure_capacity(&self) -> EngineResult<()> {
        if self.quote.item_count() >= self.config.quote.max_items {
            return Err(CoreError::QuoteTooLarge {
                max: self.config.quote.max_items,
            }
            .into());
        }
        Ok(())
    }

    fn push(&mut self, item: QuoteItem) -> EngineResult<String> {
        let source = item.price_source;
        let unit_price = item.unit_price;
        let id = self.quote.add_item(item)?;
        debug!(
            quote_id = %self.quote.id,
            item_id = %id,
            %source,
            %unit_price,
            "Quote line added"
        );
        Ok(id)
    }
}

fn line_from(
    product_id: &str,
    description: &str,
    quantity: i64,
    resolved: &ResolvedPrice,
) -> cpq_core::CoreResult<QuoteItem> {
    QuoteItem::new(
        Some(product_id.to_string()),
        description,
        quantity,
        resolved.effective_price,
        resolved.cost_price,
        resolved.source,
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
