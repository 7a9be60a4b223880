//! # Price Resolver
//!
//! Picks the unit price for a quote line.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     resolve(product, qty, customer?)                    │
//! │                                                                         │
//! │  1. Customer price list ── best tier (largest min_qty ≤ qty) ──► hit?   │
//! │         │ miss                                          customer_list   │
//! │         ▼                                                               │
//! │  2. General price list ─── best tier ──────────────────────────► hit?   │
//! │         │ miss                                           general_list   │
//! │         ▼                                                               │
//! │  3. Precomputed BOM / CPQ price on the request ─────────────► bom / cpq │
//! │         │ none                                                          │
//! │         ▼                                                               │
//! │  4. Product list price ─────────────────────────────────────► base_price│
//! │                                                                         │
//! │  A failed or invalid price list skips the remaining lists and records  │
//! │  a PriceResolutionWarning. Step 3 still applies, since the request     │
//! │  carries it. If step 4 fails too, the request's fallback price (or     │
//! │  zero) is used. resolve() never returns an error.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memoization
//! A resolver belongs to one session or request. Fetched price lists and
//! product prices are kept in its own tables, so repeated lookups for the
//! same product, quantity and customer hit the store once. Failed fetches are
//! not remembered.
//!
//! Fetched lists go through [`PriceList::normalize`] before any tier is read;
//! a list that fails it counts as a failed lookup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use cpq_core::price_list::PriceList;
use cpq_core::{CoreError, Money, PriceSource};

use crate::error::StoreError;
use crate::store::{PricingStore, ProductPricing};

// =============================================================================
// Request / Result
// =============================================================================

/// A price computed outside the resolver (configurator or bill of materials).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecomputedPrice {
    pub unit_price: Money,
    /// Expected to be [`PriceSource::Bom`] or [`PriceSource::Cpq`].
    pub source: PriceSource,
    /// Cost snapshot; when present the product record is not fetched for it.
    pub cost_price: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRequest {
    pub product_id: String,
    /// Tier lookups treat anything below 1 as 1. Quote lines validate the
    /// quantity themselves before a request is built.
    pub quantity: i64,
    pub customer_id: Option<String>,
    pub precomputed: Option<PrecomputedPrice>,
    /// Used when even the product's list price cannot be fetched.
    pub fallback_list_price: Option<Money>,
}

impl PriceRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            customer_id: None,
            precomputed: None,
            fallback_list_price: None,
        }
    }

    pub fn for_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_precomputed(mut self, precomputed: PrecomputedPrice) -> Self {
        self.precomputed = Some(precomputed);
        self
    }

    pub fn with_fallback(mut self, list_price: Money) -> Self {
        self.fallback_list_price = Some(list_price);
        self
    }
}

/// Which lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStage {
    CustomerList,
    GeneralList,
    Product,
}

impl fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStage::CustomerList => write!(f, "customer price list"),
            ResolutionStage::GeneralList => write!(f, "general price list"),
            ResolutionStage::Product => write!(f, "product pricing"),
        }
    }
}

/// Non-fatal lookup failure. The line is still priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResolutionWarning {
    pub product_id: String,
    pub stage: ResolutionStage,
    pub message: String,
}

impl fmt::Display for PriceResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "price resolution for {} fell back after {} lookup failed: {}",
            self.product_id, self.stage, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub product_id: String,
    pub quantity: i64,
    pub effective_price: Money,
    pub source: PriceSource,
    pub list_id: Option<String>,
    pub list_name: Option<String>,
    /// Threshold of the matched price list tier.
    pub tier_min_quantity: Option<i64>,
    /// Zero when no cost could be fetched.
    pub cost_price: Money,
    pub warnings: Vec<PriceResolutionWarning>,
}

impl ResolvedPrice {
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// =============================================================================
// Resolver
// =============================================================================

type ListKey = Option<String>;

/// Request-scoped price resolver with its own memo tables.
pub struct PriceResolver<S: ?Sized> {
    store: Arc<S>,
    tenant_id: String,
    memoize: bool,
    lists: HashMap<ListKey, Option<Arc<PriceList>>>,
    products: HashMap<String, ProductPricing>,
    warnings: Vec<PriceResolutionWarning>,
}

struct ListHit {
    list_id: String,
    list_name: String,
    source: PriceSource,
    min_quantity: i64,
    price: Money,
}

enum Lookup<T> {
    Found(T),
    Missing,
    Failed,
}

#[derive(Debug, Error)]
enum ListFetchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("price list {list_id} is invalid: {source}")]
    Invalid { list_id: String, source: CoreError },
}

impl<S: PricingStore + ?Sized> PriceResolver<S> {
    pub fn new(store: Arc<S>, tenant_id: impl Into<String>) -> Self {
        Self {
            store,
            tenant_id: tenant_id.into(),
            memoize: true,
            lists: HashMap::new(),
            products: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Turns the memo tables off; every lookup hits the store.
    pub fn without_memo(mut self) -> Self {
        self.memoize = false;
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Every warning raised by this resolver so far.
    pub fn warnings(&self) -> &[PriceResolutionWarning] {
        &self.warnings
    }

    /// Resolves one line's unit price. Never fails.
    ///
    /// A quantity below 1 is resolved as 1; the returned `quantity` shows
    /// the clamped value.
    pub async fn resolve(&mut self, request: &PriceRequest) -> ResolvedPrice {
        let quantity = request.quantity.max(1);
        let mut warnings = Vec::new();

        let mut hit = None;
        let mut list_failed = false;

        if let Some(customer_id) = request.customer_id.as_deref() {
            match self
                .list_tier(Some(customer_id), &request.product_id, quantity, &mut warnings)
                .await
            {
                Lookup::Found(found) => hit = Some(found),
                Lookup::Missing => {}
                Lookup::Failed => list_failed = true,
            }
        }

        if hit.is_none() && !list_failed {
            match self
                .list_tier(None, &request.product_id, quantity, &mut warnings)
                .await
            {
                Lookup::Found(found) => hit = Some(found),
                Lookup::Missing | Lookup::Failed => {}
            }
        }

        let precomputed = request.precomputed;

        // Cost comes from the precomputed price when it carries one.
        let known_cost = precomputed.and_then(|p| p.cost_price);
        let product = if known_cost.is_some() {
            None
        } else {
            self.product_pricing(&request.product_id, &mut warnings).await
        };
        let cost_price = known_cost
            .or(product.map(|p| p.cost_price))
            .unwrap_or_else(Money::zero);

        let resolved = match (hit, precomputed) {
            (Some(hit), _) => ResolvedPrice {
                product_id: request.product_id.clone(),
                quantity,
                effective_price: hit.price,
                source: hit.source,
                list_id: Some(hit.list_id),
                list_name: Some(hit.list_name),
                tier_min_quantity: Some(hit.min_quantity),
                cost_price,
                warnings: Vec::new(),
            },
            (None, Some(precomputed)) => ResolvedPrice {
                product_id: request.product_id.clone(),
                quantity,
                effective_price: precomputed.unit_price,
                source: precomputed.source,
                list_id: None,
                list_name: None,
                tier_min_quantity: None,
                cost_price,
                warnings: Vec::new(),
            },
            (None, None) => {
                let effective_price = product
                    .map(|p| p.list_price)
                    .or(request.fallback_list_price)
                    .unwrap_or_else(Money::zero);
                ResolvedPrice {
                    product_id: request.product_id.clone(),
                    quantity,
                    effective_price,
                    source: PriceSource::BasePrice,
                    list_id: None,
                    list_name: None,
                    tier_min_quantity: None,
                    cost_price,
                    warnings: Vec::new(),
                }
            }
        };

        self.warnings.extend(warnings.iter().cloned());
        debug!(
            product_id = %resolved.product_id,
            quantity,
            source = %resolved.source,
            price = %resolved.effective_price,
            "Price resolved"
        );

        ResolvedPrice { warnings, ..resolved }
    }

    /// Cost snapshot for a component product (configured lines).
    pub async fn product_cost(&mut self, product_id: &str) -> Option<Money> {
        let mut warnings = Vec::new();
        let cost = self
            .product_pricing(product_id, &mut warnings)
            .await
            .map(|p| p.cost_price);
        self.warnings.extend(warnings);
        cost
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    async fn list_tier(
        &mut self,
        customer_id: Option<&str>,
        product_id: &str,
        quantity: i64,
        warnings: &mut Vec<PriceResolutionWarning>,
    ) -> Lookup<ListHit> {
        let stage = if customer_id.is_some() {
            ResolutionStage::CustomerList
        } else {
            ResolutionStage::GeneralList
        };

        let list = match self.price_list(customer_id).await {
            Ok(Some(list)) => list,
            Ok(None) => return Lookup::Missing,
            Err(err) => {
                warnings.push(self.fallback_warning(product_id, stage, &err));
                return Lookup::Failed;
            }
        };

        match list.best_tier(product_id, quantity) {
            Some(tier) => Lookup::Found(ListHit {
                list_id: list.id.clone(),
                list_name: list.name.clone(),
                source: if list.is_customer_scoped() {
                    PriceSource::CustomerList
                } else {
                    PriceSource::GeneralList
                },
                min_quantity: tier.min_quantity,
                price: tier.effective_price(),
            }),
            None => Lookup::Missing,
        }
    }

    async fn price_list(&mut self, customer_id: Option<&str>) -> Result<Option<Arc<PriceList>>, ListFetchError> {
        let key: ListKey = customer_id.map(str::to_string);

        if self.memoize {
            if let Some(cached) = self.lists.get(&key) {
                debug!(customer_id = ?customer_id, "Price list memo hit");
                return Ok(cached.clone());
            }
        }

        let list = match self.store.get_price_list(&self.tenant_id, customer_id).await? {
            Some(list) => {
                let list_id = list.id.clone();
                let list = list
                    .normalize()
                    .map_err(|source| ListFetchError::Invalid { list_id, source })?;
                Some(Arc::new(list))
            }
            None => None,
        };

        if self.memoize {
            self.lists.insert(key, list.clone());
        }
        Ok(list)
    }

    async fn product_pricing(
        &mut self,
        product_id: &str,
        warnings: &mut Vec<PriceResolutionWarning>,
    ) -> Option<ProductPricing> {
        if self.memoize {
            if let Some(cached) = self.products.get(product_id) {
                debug!(product_id, "Product pricing memo hit");
                return Some(*cached);
            }
        }

        match self.store.get_product_cost_and_base(product_id).await {
            Ok(pricing) => {
                if self.memoize {
                    self.products.insert(product_id.to_string(), pricing);
                }
                Some(pricing)
            }
            Err(err) => {
                warnings.push(self.fallback_warning(product_id, ResolutionStage::Product, &err));
                None
            }
        }
    }

    fn fallback_warning(
        &self,
        product_id: &str,
        stage: ResolutionStage,
        err: &dyn std::error::Error,
    ) -> PriceResolutionWarning {
        warn!(
            product_id,
            tenant_id = %self.tenant_id,
            %stage,
            error = %err,
            "Price lookup failed, falling back"
        );
        PriceResolutionWarning {
            product_id: product_id.to_string(),
            stage,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use cpq_core::price_list::{PriceListItem, PriceListScope};
    use cpq_core::types::Percent;

    const TENANT: &str = "00000000-0000-0000-0000-000000000001";

    fn tier(product_id: &str, min_quantity: i64, cents: i64) -> PriceListItem {
        PriceListItem {
            product_id: product_id.to_string(),
            min_quantity,
            unit_price: Money::from_cents(cents),
            discount_percent: Percent::zero(),
        }
    }

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with_price_list(
                TENANT,
                PriceList {
                    id: "pl-general".to_string(),
                    name: "General 2026".to_string(),
                    currency: "ILS".to_string(),
                    scope: PriceListScope::General,
                    items: vec![tier("desk", 1, 50_000), tier("desk", 10, 45_000), tier("chair", 1, 9_000)],
                },
            )
            .with_price_list(
                TENANT,
                PriceList {
                    id: "pl-acme".to_string(),
                    name: "Acme".to_string(),
                    currency: "ILS".to_string(),
                    scope: PriceListScope::Customer {
                        customer_id: "acme".to_string(),
                    },
                    items: vec![tier("desk", 1, 48_000), tier("desk", 20, 40_000)],
                },
            )
            .with_product("desk", Money::from_cents(30_000), Money::from_cents(55_000))
            .with_product("chair", Money::from_cents(4_000), Money::from_cents(9_900))
            .with_product("lamp", Money::from_cents(1_000), Money::from_cents(2_500))
    }

    fn resolver(store: Arc<InMemoryStore>) -> PriceResolver<InMemoryStore> {
        PriceResolver::new(store, TENANT)
    }

    #[tokio::test]
    async fn test_customer_list_wins() {
        let mut resolver = resolver(Arc::new(store()));
        let price = resolver
            .resolve(&PriceRequest::new("desk", 25).for_customer("acme"))
            .await;

        assert_eq!(price.source, PriceSource::CustomerList);
        assert_eq!(price.effective_price, Money::from_cents(40_000));
        assert_eq!(price.tier_min_quantity, Some(20));
        assert_eq!(price.list_id.as_deref(), Some("pl-acme"));
        assert_eq!(price.cost_price, Money::from_cents(30_000));
        assert!(!price.is_degraded());
    }

    #[tokio::test]
    async fn test_general_list_when_customer_has_no_tier() {
        let mut resolver = resolver(Arc::new(store()));
        let price = resolver
            .resolve(&PriceRequest::new("chair", 3).for_customer("acme"))
            .await;
        assert_eq!(price.source, PriceSource::GeneralList);
        assert_eq!(price.effective_price, Money::from_cents(9_000));

        let price = resolver.resolve(&PriceRequest::new("desk", 12)).await;
        assert_eq!(price.source, PriceSource::GeneralList);
        assert_eq!(price.tier_min_quantity, Some(10));
    }

    #[tokio::test]
    async fn test_precomputed_then_base_price() {
        let mut resolver = resolver(Arc::new(store()));
        let request = PriceRequest::new("lamp", 2).with_precomputed(PrecomputedPrice {
            unit_price: Money::from_cents(2_200),
            source: PriceSource::Bom,
            cost_price: None,
        });
        let price = resolver.resolve(&request).await;
        assert_eq!(price.source, PriceSource::Bom);
        assert_eq!(price.effective_price, Money::from_cents(2_200));
        assert_eq!(price.cost_price, Money::from_cents(1_000));

        let price = resolver.resolve(&PriceRequest::new("lamp", 2)).await;
        assert_eq!(price.source, PriceSource::BasePrice);
        assert_eq!(price.effective_price, Money::from_cents(2_500));
    }

    #[tokio::test]
    async fn test_offline_store_falls_back_with_warning() {
        let store = Arc::new(store());
        store.set_offline(true);
        let mut resolver = resolver(store);

        let request = PriceRequest::new("desk", 5)
            .for_customer("acme")
            .with_fallback(Money::from_cents(52_000));
        let price = resolver.resolve(&request).await;

        assert_eq!(price.source, PriceSource::BasePrice);
        assert_eq!(price.effective_price, Money::from_cents(52_000));
        assert_eq!(price.cost_price, Money::zero());
        let stages: Vec<ResolutionStage> = price.warnings.iter().map(|w| w.stage).collect();
        assert_eq!(stages, vec![ResolutionStage::CustomerList, ResolutionStage::Product]);
        assert_eq!(resolver.warnings().len(), 2);
    }

    #[tokio::test]
    async fn test_list_failure_keeps_precomputed() {
        let store = Arc::new(store());
        store.set_offline(true);
        let mut resolver = resolver(store);

        let request = PriceRequest::new("lamp", 1).with_precomputed(PrecomputedPrice {
            unit_price: Money::from_cents(2_200),
            source: PriceSource::Cpq,
            cost_price: Some(Money::from_cents(900)),
        });
        let price = resolver.resolve(&request).await;
        assert_eq!(price.source, PriceSource::Cpq);
        assert_eq!(price.effective_price, Money::from_cents(2_200));
        assert_eq!(price.cost_price, Money::from_cents(900));
        let stages: Vec<ResolutionStage> = price.warnings.iter().map(|w| w.stage).collect();
        assert_eq!(stages, vec![ResolutionStage::GeneralList]);
    }

    #[tokio::test]
    async fn test_price_lists_down_uses_product_record() {
        let store = Arc::new(store());
        store.set_price_lists_offline(true);
        let mut resolver = resolver(Arc::clone(&store));

        let price = resolver
            .resolve(&PriceRequest::new("desk", 25).for_customer("acme"))
            .await;
        assert_eq!(price.source, PriceSource::BasePrice);
        assert_eq!(price.effective_price, Money::from_cents(55_000));
        assert_eq!(price.cost_price, Money::from_cents(30_000));
        assert_eq!(price.warnings.len(), 1);
        assert_eq!(price.warnings[0].stage, ResolutionStage::CustomerList);
        assert_eq!(store.price_list_fetches(), 1);
    }

    #[tokio::test]
    async fn test_invalid_list_is_a_failed_lookup() {
        let store = InMemoryStore::new()
            .with_price_list(
                TENANT,
                PriceList {
                    id: "pl-broken".to_string(),
                    name: "Broken".to_string(),
                    currency: "ILS".to_string(),
                    scope: PriceListScope::General,
                    items: vec![tier("desk", 10, 45_000), tier("desk", 10, 44_000)],
                },
            )
            .with_product("desk", Money::from_cents(30_000), Money::from_cents(55_000));
        let store = Arc::new(store);
        let mut resolver = resolver(Arc::clone(&store));

        let price = resolver.resolve(&PriceRequest::new("desk", 12)).await;
        assert_eq!(price.source, PriceSource::BasePrice);
        assert_eq!(price.effective_price, Money::from_cents(55_000));
        assert_eq!(price.warnings.len(), 1);
        assert_eq!(price.warnings[0].stage, ResolutionStage::GeneralList);
        assert!(price.warnings[0].message.contains("pl-broken"));

        resolver.resolve(&PriceRequest::new("desk", 12)).await;
        assert_eq!(store.price_list_fetches(), 2);
    }

    #[tokio::test]
    async fn test_unsorted_list_resolves_after_normalize() {
        let store = Arc::new(InMemoryStore::new().with_price_list(
            TENANT,
            PriceList {
                id: "pl-general".to_string(),
                name: "General".to_string(),
                currency: "ILS".to_string(),
                scope: PriceListScope::General,
                items: vec![tier("desk", 50, 40_000), tier("desk", 1, 50_000), tier("desk", 10, 45_000)],
            },
        ));
        let mut resolver = resolver(store);

        let price = resolver.resolve(&PriceRequest::new("desk", 12)).await;
        assert_eq!(price.tier_min_quantity, Some(10));
        assert_eq!(price.effective_price, Money::from_cents(45_000));
    }

    #[tokio::test]
    async fn test_non_positive_quantity_resolves_as_one() {
        let mut resolver = resolver(Arc::new(store()));
        let price = resolver.resolve(&PriceRequest::new("desk", 0)).await;
        assert_eq!(price.quantity, 1);
        assert_eq!(price.tier_min_quantity, Some(1));
        assert_eq!(price.effective_price, Money::from_cents(50_000));
    }

    #[tokio::test]
    async fn test_memoized_fetches() {
        let store = Arc::new(store());
        let mut resolver = resolver(Arc::clone(&store));

        let request = PriceRequest::new("desk", 3).for_customer("acme");
        let first = resolver.resolve(&request).await;
        let second = resolver.resolve(&request).await;

        assert_eq!(first, second);
        assert_eq!(store.price_list_fetches(), 1);
        assert_eq!(store.product_fetches(), 1);
    }

    #[tokio::test]
    async fn test_without_memo_refetches() {
        let store = Arc::new(store());
        let mut resolver = resolver(Arc::clone(&store)).without_memo();

        let request = PriceRequest::new("chair", 1);
        resolver.resolve(&request).await;
        resolver.resolve(&request).await;

        assert_eq!(store.price_list_fetches(), 2);
        assert_eq!(store.product_fetches(), 2);
    }

    #[tokio::test]
    async fn test_resolvers_do_not_share_memo() {
        let store = Arc::new(store());
        let request = PriceRequest::new("chair", 1);

        resolver(Arc::clone(&store)).resolve(&request).await;
        resolver(Arc::clone(&store)).resolve(&request).await;

        assert_eq!(store.price_list_fetches(), 2);
    }
}
