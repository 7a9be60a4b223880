//! # Configuration Session
//!
//! One user configuring one template: owns the selection, re-evaluates rules
//! and prices on demand.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Configuration Session Flow                          │
//! │                                                                         │
//! │  open(store, template_id)                                              │
//! │      │   load_template → Catalog → apply_defaults                      │
//! │      ▼                                                                  │
//! │  select / deselect / replace_group / apply_preset / set_quantity       │
//! │      │   (mutations are checked against the catalog)                   │
//! │      ▼                                                                  │
//! │  summary()                                                              │
//! │      │   evaluate(catalog, selection)   → violations, forced, hidden   │
//! │      │   configured_price(effective selection, quantity)               │
//! │      ▼                                                                  │
//! │  QuoteBuilder::add_configured(&session)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Evaluation is not cached: it is pure and cheap, and every call sees the
//! current selection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use cpq_core::pricing::{configured_price, ConfiguredPrice};
use cpq_core::validation::validate_quantity;
use cpq_core::{evaluate, Catalog, EvaluationResult, Selection, SelectionState, TemplateRecord};

use crate::error::EngineResult;
use crate::store::CatalogStore;

/// Evaluation and price of the current selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationSummary {
    pub template_id: String,
    pub evaluation: EvaluationResult,
    pub price: ConfiguredPrice,
}

impl ConfigurationSummary {
    pub fn is_valid(&self) -> bool {
        self.evaluation.is_valid()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigurationSession {
    id: String,
    state: SelectionState,
    quantity: i64,
}

impl ConfigurationSession {
    /// Loads a template and starts a session with its defaults selected.
    pub async fn open<S: CatalogStore + ?Sized>(store: &S, template_id: &str) -> EngineResult<Self> {
        let record = store.load_template(template_id).await?;
        let session = Self::from_record(record);
        info!(
            session_id = %session.id,
            template_id,
            "Configuration session opened"
        );
        Ok(session)
    }

    pub fn from_record(record: TemplateRecord) -> Self {
        Self::new(Arc::new(Catalog::from_record(record)))
    }

    /// Starts a session on an already-built catalog (shared between sessions).
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let mut state = SelectionState::new(catalog);
        let applied = state.apply_defaults();
        let id = Uuid::new_v4().to_string();
        debug!(session_id = %id, defaults = applied, "Defaults applied");

        Self {
            id,
            state,
            quantity: 1,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn catalog(&self) -> &Catalog {
        self.state.catalog()
    }

    pub fn template_id(&self) -> &str {
        &self.catalog().template().id
    }

    /// The user's own selection (without auto-selected options).
    pub fn selection(&self) -> &Selection {
        self.state.selection()
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub fn select(&mut self, group_id: &str, option_id: &str) -> EngineResult<()> {
        self.state.select(group_id, option_id)?;
        debug!(session_id = %self.id, group_id, option_id, "Option selected");
        Ok(())
    }

    /// Returns whether the option was selected before.
    pub fn deselect(&mut self, group_id: &str, option_id: &str) -> EngineResult<bool> {
        let removed = self.state.deselect(group_id, option_id)?;
        debug!(session_id = %self.id, group_id, option_id, removed, "Option deselected");
        Ok(removed)
    }

    pub fn replace_group(&mut self, group_id: &str, option_ids: &[String]) -> EngineResult<()> {
        self.state.replace_group(group_id, option_ids)?;
        debug!(
            session_id = %self.id,
            group_id,
            count = option_ids.len(),
            "Group selection replaced"
        );
        Ok(())
    }

    pub fn clear_group(&mut self, group_id: &str) -> EngineResult<()> {
        self.state.clear_group(group_id)?;
        debug!(session_id = %self.id, group_id, "Group cleared");
        Ok(())
    }

    pub fn apply_preset(&mut self, preset_id: &str) -> EngineResult<()> {
        self.state.apply_preset(preset_id)?;
        debug!(session_id = %self.id, preset_id, "Preset applied");
        Ok(())
    }

    /// Clears the selection and re-applies the template defaults.
    pub fn reset(&mut self) {
        self.state.clear();
        let applied = self.state.apply_defaults();
        debug!(session_id = %self.id, defaults = applied, "Session reset");
    }

    pub fn set_quantity(&mut self, quantity: i64) -> EngineResult<()> {
        validate_quantity(quantity)?;
        self.quantity = quantity;
        debug!(session_id = %self.id, quantity, "Quantity changed");
        Ok(())
    }

    // =========================================================================
    // Evaluation & Pricing
    // =========================================================================

    pub fn evaluate(&self) -> EngineResult<EvaluationResult> {
        Ok(evaluate(self.catalog(), self.selection())?)
    }

    /// Price of the effective selection (auto-selected options included).
    pub fn price(&self) -> EngineResult<ConfiguredPrice> {
        Ok(self.summary()?.price)
    }

    pub fn summary(&self) -> EngineResult<ConfigurationSummary> {
        let evaluation = self.evaluate()?;
        let price = configured_price(self.catalog(), &evaluation.selection, self.quantity)?;

        debug!(
            session_id = %self.id,
            violations = evaluation.violations.len(),
            unit_price = %price.unit_price,
            "Configuration evaluated"
        );

        Ok(ConfigurationSummary {
            template_id: self.template_id().to_string(),
            evaluation,
            price,
        })
    }

    /// Human-readable line description: template name and chosen options.
    pub fn describe(&self, selection: &Selection) -> String {
        let catalog = self.catalog();
        let names: Vec<&str> = selection
            .iter()
            .filter_map(|(_, option_id)| catalog.option(option_id))
            .map(|option| option.name.as_str())
            .collect();

        if names.is_empty() {
            catalog.template().name.clone()
        } else {
            format!("{} ({})", catalog.template().name, names.join(", "))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
