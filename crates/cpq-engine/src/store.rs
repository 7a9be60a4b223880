//! # Collaborator Stores
//!
//! Async traits for the persistence collaborators the engine reads from,
//! plus an in-memory implementation for tests and the demo binary.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Store Boundary                                   │
//! │                                                                         │
//! │  ConfigurationSession ──► CatalogStore::load_template(template_id)      │
//! │                                                                         │
//! │  PriceResolver ─────────► PricingStore::get_price_list(tenant, cust?)   │
//! │                           PricingStore::get_product_cost_and_base(id)   │
//! │                                                                         │
//! │  Implementations: InMemoryStore (here), database/REST adapters outside  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cpq_core::price_list::{PriceList, PriceListScope};
use cpq_core::{Money, TemplateRecord};

use crate::error::StoreError;

// =============================================================================
// Traits
// =============================================================================

/// Cost and list price of a plain product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPricing {
    pub cost_price: Money,
    pub list_price: Money,
}

/// Loads configurable templates with their groups, rules and presets.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load_template(&self, template_id: &str) -> Result<TemplateRecord, StoreError>;
}

/// Price data used by the resolver.
#[async_trait]
pub trait PricingStore: Send + Sync {
    /// The customer's list when `customer_id` is set, the tenant's general
    /// list otherwise. `Ok(None)` when no such list exists.
    async fn get_price_list(
        &self,
        tenant_id: &str,
        customer_id: Option<&str>,
    ) -> Result<Option<PriceList>, StoreError>;

    async fn get_product_cost_and_base(&self, product_id: &str) -> Result<ProductPricing, StoreError>;
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Store backed by hash maps.
///
/// Built with the `with_*` methods before it is shared. `set_offline(true)`
/// makes every call fail with [`StoreError::Unavailable`], and
/// `set_price_lists_offline(true)` does the same for price lists only. The
/// fetch counters let tests assert on memoization.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    templates: HashMap<String, TemplateRecord>,
    price_lists: HashMap<String, Vec<PriceList>>,
    products: HashMap<String, ProductPricing>,
    offline: AtomicBool,
    price_lists_offline: AtomicBool,
    template_fetches: AtomicUsize,
    price_list_fetches: AtomicUsize,
    product_fetches: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, record: TemplateRecord) -> Self {
        self.templates.insert(record.template.id.clone(), record);
        self
    }

    pub fn with_price_list(mut self, tenant_id: &str, list: PriceList) -> Self {
        self.price_lists
            .entry(tenant_id.to_string())
            .or_default()
            .push(list);
        self
    }

    pub fn with_product(mut self, product_id: &str, cost_price: Money, list_price: Money) -> Self {
        self.products.insert(
            product_id.to_string(),
            ProductPricing {
                cost_price,
                list_price,
            },
        );
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_price_lists_offline(&self, offline: bool) {
        self.price_lists_offline.store(offline, Ordering::SeqCst);
    }

    pub fn template_fetches(&self) -> usize {
        self.template_fetches.load(Ordering::SeqCst)
    }

    pub fn price_list_fetches(&self) -> usize {
        self.price_list_fetches.load(Ordering::SeqCst)
    }

    pub fn product_fetches(&self) -> usize {
        self.product_fetches.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn load_template(&self, template_id: &str) -> Result<TemplateRecord, StoreError> {
        self.template_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        self.templates
            .get(template_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "template".to_string(),
                id: template_id.to_string(),
            })
    }
}

#[async_trait]
impl PricingStore for InMemoryStore {
    async fn get_price_list(
        &self,
        tenant_id: &str,
        customer_id: Option<&str>,
    ) -> Result<Option<PriceList>, StoreError> {
        self.price_list_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if self.price_lists_offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("price lists are offline".to_string()));
        }

        let Some(lists) = self.price_lists.get(tenant_id) else {
            return Ok(None);
        };

        let found = lists.iter().find(|list| match (&list.scope, customer_id) {
            (PriceListScope::Customer { customer_id: owner }, Some(wanted)) => owner == wanted,
            (PriceListScope::General, None) => true,
            _ => false,
        });

        Ok(found.cloned())
    }

    async fn get_product_cost_and_base(&self, product_id: &str) -> Result<ProductPricing, StoreError> {
        self.product_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        self.products
            .get(product_id)
            .copied()
            .ok_or_else(|| StoreError::NotFound {
                entity: "product".to_string(),
                id: product_id.to_string(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
