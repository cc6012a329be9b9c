//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Invoice computation failures                   │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ConfigError      - tally.toml / environment problems              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ← DbError (duplicate number,        │
//! │                                               storage failure)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any per-line failure aborts the whole invoice: nothing partial is ever
//! returned. Report operations (breakdown, revenue) cannot fail.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Invoice computation errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A line asked for less than one unit.
    #[error("Invalid quantity {quantity}: must be at least 1")]
    InvalidQuantity { quantity: i64 },

    /// A product carries a negative or absurdly large tax rate.
    #[error(
        "Invalid tax rate {bps} bps: must be between 0 and {max}",
        max = crate::types::TaxRate::MAX_BPS
    )]
    InvalidRate { bps: i64 },

    /// A line or invoice amount does not fit in minor units.
    #[error("Amount out of range: {field} exceeds the representable maximum")]
    AmountOutOfRange { field: &'static str },

    /// Product cannot be found.
    ///
    /// ## When This Occurs
    /// - A line request names a product id that doesn't exist
    /// - The product was removed between form load and submit
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Customer cannot be found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Invoice has no line items.
    #[error("Invoice must contain at least one line item")]
    EmptyInvoice,

    /// Invoice number already taken.
    ///
    /// ## Retry Flow
    /// ```text
    /// generate number ──► insert ──► UNIQUE constraint failed
    ///       ▲                                 │
    ///       └──────── DuplicateIdentifier ◄───┘  (bounded attempts)
    /// ```
    #[error("Invoice number already exists: {0}")]
    DuplicateIdentifier(String),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
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

    /// Invalid format (e.g., malformed GSTIN, unparsable amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
