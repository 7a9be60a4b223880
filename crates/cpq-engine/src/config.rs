//! # Engine Configuration
//!
//! Tenant and quote defaults for the configurator engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CPQ_TENANT_ID=00000000-0000-0000-0000-000000000001                 │
//! │     CPQ_CURRENCY=EUR                                                   │
//! │     CPQ_TAX_RATE=17          (percent)                                 │
//! │     CPQ_MIN_MARGIN=20        (percent)                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/cpq/cpq.toml (Linux)                                     │
//! │     ~/Library/Application Support/com.keystone.cpq/cpq.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Default tenant, ILS, 17% tax, 20% minimum margin                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # cpq.toml
//! [tenant]
//! id = "00000000-0000-0000-0000-000000000001"
//! name = "Keystone Demo"
//!
//! [quote]
//! currency = "ILS"
//! tax_rate_bps = 1700
//! min_margin_bps = 2000
//! max_items = 500
//!
//! [pricing]
//! memoize = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use cpq_core::types::{Percent, TaxRate, BPS_SCALE};
use cpq_core::validation::{validate_currency_code, validate_tax_rate_bps, validate_uuid};
use cpq_core::{
    DEFAULT_CURRENCY, DEFAULT_MIN_MARGIN_BPS, DEFAULT_TAX_RATE_BPS, DEFAULT_TENANT_ID,
    MAX_QUOTE_ITEMS,
};

use crate::error::ConfigError;

// =============================================================================
// Tenant Settings
// =============================================================================

/// Which tenant's price lists the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    #[serde(default = "default_tenant_id")]
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,
}

fn default_tenant_id() -> String {
    DEFAULT_TENANT_ID.to_string()
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            id: default_tenant_id(),
            name: None,
        }
    }
}

// =============================================================================
// Quote Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSettings {
    /// ISO 4217 code for new quotes.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Tax applied to the due-today total (1700 = 17%).
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,

    /// Quotes below this margin need approval (2000 = 20%).
    #[serde(default = "default_min_margin_bps")]
    pub min_margin_bps: i64,

    /// Upper bound on lines per quote; cannot exceed the core hard limit.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_tax_rate_bps() -> u32 {
    DEFAULT_TAX_RATE_BPS
}

fn default_min_margin_bps() -> i64 {
    DEFAULT_MIN_MARGIN_BPS
}

fn default_max_items() -> usize {
    MAX_QUOTE_ITEMS
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            tax_rate_bps: default_tax_rate_bps(),
            min_margin_bps: default_min_margin_bps(),
            max_items: default_max_items(),
        }
    }
}

// =============================================================================
// Pricing Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Reuse resolved prices within one resolver instance.
    #[serde(default = "default_memoize")]
    pub memoize: bool,
}

fn default_memoize() -> bool {
    true
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            memoize: default_memoize(),
        }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub tenant: TenantConfig,

    #[serde(default)]
    pub quote: QuoteSettings,

    #[serde(default)]
    pub pricing: PricingSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Loading Order
    /// 1. Start with defaults
    /// 2. Load from TOML file if exists
    /// 3. Override with environment variables
    /// 4. Validate the result
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> Result<(), ConfigError> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_uuid(&self.tenant.id, "tenant.id").map_err(invalid)?;
        validate_currency_code(&self.quote.currency).map_err(invalid)?;
        validate_tax_rate_bps(self.quote.tax_rate_bps).map_err(invalid)?;

        if !(0..=BPS_SCALE).contains(&self.quote.min_margin_bps) {
            return Err(ConfigError::Invalid(format!(
                "min_margin_bps must be between 0 and {}, got {}",
                BPS_SCALE, self.quote.min_margin_bps
            )));
        }

        if self.quote.max_items == 0 || self.quote.max_items > MAX_QUOTE_ITEMS {
            return Err(ConfigError::Invalid(format!(
                "max_items must be between 1 and {}, got {}",
                MAX_QUOTE_ITEMS, self.quote.max_items
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("CPQ_TENANT_ID") {
            debug!(tenant_id = %id, "Overriding tenant ID from environment");
            self.tenant.id = id;
        }

        if let Some(currency) = lookup("CPQ_CURRENCY") {
            debug!(currency = %currency, "Overriding currency from environment");
            self.quote.currency = currency.trim().to_ascii_uppercase();
        }

        if let Some(rate) = lookup("CPQ_TAX_RATE") {
            match parse_percentage(&rate) {
                Some(pct) => {
                    debug!(tax_rate = %rate, "Overriding tax rate from environment");
                    self.quote.tax_rate_bps = TaxRate::from_percentage(pct).bps();
                }
                None => warn!(value = %rate, "Ignoring invalid CPQ_TAX_RATE"),
            }
        }

        if let Some(margin) = lookup("CPQ_MIN_MARGIN") {
            match parse_percentage(&margin) {
                Some(pct) => {
                    debug!(min_margin = %margin, "Overriding minimum margin from environment");
                    self.quote.min_margin_bps = Percent::from_percentage(pct).bps();
                }
                None => warn!(value = %margin, "Ignoring invalid CPQ_MIN_MARGIN"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "keystone", "cpq")
            .map(|dirs| dirs.config_dir().join("cpq.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn tenant_id(&self) -> &str {
        &self.tenant.id
    }

    pub fn currency(&self) -> &str {
        &self.quote.currency
    }

    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.quote.tax_rate_bps)
    }

    pub fn min_margin(&self) -> Percent {
        Percent::from_bps(self.quote.min_margin_bps)
    }
}

fn invalid(err: cpq_core::ValidationError) -> ConfigError {
    ConfigError::Invalid(err.to_string())
}

/// Parses a non-negative finite percentage such as `"17"` or `"12.5"`.
fn parse_percentage(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|pct| pct.is_finite() && *pct >= 0.0)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.tenant_id(), DEFAULT_TENANT_ID);
        assert_eq!(config.currency(), "ILS");
        assert_eq!(config.tax_rate().bps(), 1700);
        assert_eq!(config.min_margin(), Percent::from_whole(20));
        assert!(config.pricing.memoize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.tenant.id = "tenant-1".into();
        assert_matches!(config.validate(), Err(ConfigError::Invalid(_)));

        let mut config = EngineConfig::default();
        config.quote.currency = "shekel".into();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.quote.min_margin_bps = -1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.quote.max_items = MAX_QUOTE_ITEMS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[tenant]"));
        assert!(toml_str.contains("[quote]"));
        assert!(toml_str.contains("[pricing]"));

        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: EngineConfig = toml::from_str("[quote]\ncurrency = \"EUR\"\n").unwrap();
        assert_eq!(parsed.currency(), "EUR");
        assert_eq!(parsed.quote.tax_rate_bps, 1700);
        assert_eq!(parsed.tenant_id(), DEFAULT_TENANT_ID);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CPQ_CURRENCY", "eur"),
            ("CPQ_TAX_RATE", "19"),
            ("CPQ_MIN_MARGIN", "12.5"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.currency(), "EUR");
        assert_eq!(config.quote.tax_rate_bps, 1900);
        assert_eq!(config.quote.min_margin_bps, 1250);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = EngineConfig::default();
        config.apply_overrides(|key| match key {
            "CPQ_TAX_RATE" => Some("lots".to_string()),
            "CPQ_MIN_MARGIN" => Some("-5".to_string()),
            _ => None,
        });
        assert_eq!(config.quote.tax_rate_bps, 1700);
        assert_eq!(config.quote.min_margin_bps, 2000);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystone").join("cpq.toml");

        let mut config = EngineConfig::default();
        config.quote.currency = "USD".into();
        config.pricing.memoize = false;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let loaded: EngineConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpq.toml");
        std::fs::write(&path, "[quote]\ntax_rate_bps = \"high\"\n").unwrap();

        assert_matches!(EngineConfig::load(Some(path.clone())), Err(ConfigError::Parse(_)));
        let config = EngineConfig::load_or_default(Some(path));
        assert_eq!(config.quote.tax_rate_bps, DEFAULT_TAX_RATE_BPS);
    }
}
