//! # Engine Error Types
//!
//! Error types for the async edge of the configurator.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Engine Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Collaborator  │  │     Domain              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Io             │  │  Unavailable    │  │  CoreError (selection,  │ │
//! │  │  Parse          │  │  NotFound       │  │  quote, references)     │ │
//! │  │  Invalid        │  │                 │  │  InvalidConfiguration   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Price lookups never surface `StoreError` to callers: the resolver turns
//! them into warnings and falls back. Template loads do propagate it.

use cpq_core::CoreError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Store Errors
// =============================================================================

/// Failure reported by a persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl StoreError {
    /// Returns true if a retry could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

// =============================================================================
// Config Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// No explicit path and no platform config directory.
    #[error("No config path available")]
    NoPath,
}

// =============================================================================
// Engine Error
// =============================================================================

/// Top-level error for sessions, the quote builder and configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A configured product with rule violations cannot be quoted.
    #[error("Configuration of {template_id} has {violations} unresolved violation(s)")]
    InvalidConfiguration { template_id: String, violations: usize },
}

impl From<cpq_core::ValidationError> for EngineError {
    fn from(err: cpq_core::ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

impl EngineError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(self, EngineError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(StoreError::Unavailable("timeout".into()).is_retryable());
        assert!(!StoreError::NotFound {
            entity: "template".into(),
            id: "t-1".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err: EngineError = StoreError::NotFound {
            entity: "template".into(),
            id: "t-1".into(),
        }
        .into();
        assert_eq!(err.to_string(), "template not found: t-1");
        assert!(!err.is_config_error());

        let err: EngineError = ConfigError::Invalid("currency".into()).into();
        assert!(err.is_config_error());
    }
}
