//! # cpq-engine: Async Edge of Keystone CPQ
//!
//! Connects the pure `cpq-core` algorithms to the persistence collaborators:
//! loads templates, resolves prices against price lists, and assembles
//! quotes.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Engine Architecture                              │
//! │                                                                         │
//! │  ┌──────────────────────────┐        ┌──────────────────────────────┐  │
//! │  │  ConfigurationSession    │        │  QuoteBuilder                │  │
//! │  │                          │        │                              │  │
//! │  │  SelectionState          │───────►│  add_product / add_configured│  │
//! │  │  evaluate + price        │        │  totals (tax, margin)        │  │
//! │  └────────────┬─────────────┘        └──────────────┬───────────────┘  │
//! │               │                                     │                   │
//! │               ▼                                     ▼                   │
//! │  ┌──────────────────────────┐        ┌──────────────────────────────┐  │
//! │  │  CatalogStore (async)    │        │  PriceResolver (memoized)    │  │
//! │  │  load_template           │        │  customer → general → bom    │  │
//! │  └──────────────────────────┘        │  → base, warnings on failure │  │
//! │                                      └──────────────┬───────────────┘  │
//! │                                                     ▼                   │
//! │                                      ┌──────────────────────────────┐  │
//! │                                      │  PricingStore (async)        │  │
//! │                                      └──────────────────────────────┘  │
//! │                                                                         │
//! │  EngineConfig: defaults → cpq.toml → CPQ_* env → validate              │
//! │  telemetry::init_tracing: tracing-subscriber with EnvFilter            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`builder`] - `QuoteBuilder`
//! - [`config`] - Engine configuration (tenant, quote defaults, pricing)
//! - [`error`] - Engine, store and config errors
//! - [`resolver`] - Price resolution with per-instance memo tables
//! - [`session`] - Configuration sessions
//! - [`store`] - Collaborator traits and the in-memory store
//! - [`telemetry`] - Logging setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cpq_engine::{ConfigurationSession, EngineConfig, InMemoryStore, QuoteBuilder};
//!
//! let store = Arc::new(InMemoryStore::new().with_template(record));
//! let config = EngineConfig::load_or_default(None);
//!
//! let mut session = ConfigurationSession::open(store.as_ref(), "workstation").await?;
//! session.select("legs", "legs-electric")?;
//!
//! let mut builder = QuoteBuilder::new(config, store)?;
//! builder.add_configured(&session).await?;
//! println!("Grand total: {}", builder.totals().grand_total);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod builder;
pub mod config;
pub mod error;
pub mod resolver;
pub mod session;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod fixtures;

// =============================================================================
// Re-exports
// =============================================================================

pub use builder::QuoteBuilder;
pub use config::{EngineConfig, PricingSettings, QuoteSettings, TenantConfig};
pub use error::{ConfigError, EngineError, EngineResult, StoreError};
pub use resolver::{
    PrecomputedPrice, PriceRequest, PriceResolutionWarning, PriceResolver, ResolutionStage, ResolvedPrice,
};
pub use session::{ConfigurationSession, ConfigurationSummary};
pub use store::{CatalogStore, InMemoryStore, PricingStore, ProductPricing};
