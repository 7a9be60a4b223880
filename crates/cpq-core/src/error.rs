//! # Error Types
//!
//! Domain-specific error types for cpq-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cpq-core errors (this file)                                           │
//! │  ├── CoreError        - Rejected mutations, programmer errors          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  NOT errors (returned as data, never thrown)                           │
//! │  ├── Violation        - rules::Violation, inline UI messages           │
//! │  ├── RuleCycle        - rules::RuleCycle, cyclic auto_select rules     │
//! │  └── PublishError     - publish::PublishError, authoring defects       │
//! │                                                                         │
//! │  cpq-engine errors (separate crate)                                    │
//! │  └── EngineError      - Collaborator / configuration failures          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (group ID, option ID, limits)
//! 3. Expected business conditions are never errors; they are violations

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Group ID is not part of the catalog.
    #[error("Option group not found: {0}")]
    UnknownGroup(String),

    /// Option ID is not part of the catalog.
    #[error("Option not found: {0}")]
    UnknownOption(String),

    /// The option exists but belongs to another group.
    #[error("Option {option_id} does not belong to group {group_id}")]
    OptionNotInGroup { option_id: String, group_id: String },

    /// The option is flagged unavailable in the catalog.
    #[error("Option {0} is not available")]
    OptionUnavailable(String),

    /// Selecting would exceed the group's `max_selections`.
    ///
    /// ## User Workflow
    /// ```text
    /// Group "Add-ons" (multiple, max 2) has [A, B]
    ///      │
    ///      ▼
    /// select(C)
    ///      │
    ///      ▼
    /// SelectionLimit { group_id: "Add-ons", max: 2 }
    ///      │
    ///      ▼
    /// UI: "Deselect an add-on first" (selection still [A, B])
    /// ```
    #[error("Group {group_id} allows at most {max} selection(s)")]
    SelectionLimit { group_id: String, max: u32 },

    /// Preset ID is not part of the catalog.
    #[error("Preset not found: {0}")]
    UnknownPreset(String),

    /// Preset exists but is switched off.
    #[error("Preset {0} is not active")]
    PresetInactive(String),

    /// An active rule points at an option or group that does not exist.
    ///
    /// ## When This Occurs
    /// Only when a catalog skipped publish validation. This is a programmer
    /// error: the publish validator reports the same defect up front.
    #[error("Rule {rule_id} references unknown {reference}")]
    DanglingReference { rule_id: String, reference: String },

    /// Quote line not found.
    #[error("Quote item not found: {0}")]
    QuoteItemNotFound(String),

    /// Quote has reached its maximum line count.
    #[error("Quote cannot have more than {max} items")]
    QuoteTooLarge { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., two price tiers with the same threshold).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
