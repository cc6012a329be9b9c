//! # Validation Module
//!
//! Field-level checks run before anything is computed or stored.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Form / request parsing (outside this workspace)              │
//! │  ├── Money / TaxRate parsing from text                                 │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Names, prices, rates, GSTIN, search text                          │
//! │  └── Called by repositories and the invoice assembler                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE invoice_number                                             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Quantity and rate sign checks are not here: the line calculator reports
//! them as `InvalidQuantity` / `InvalidRate`.
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_customer_name, validate_price_minor};
//!
//! validate_customer_name("Acme Traders").unwrap();
//! validate_price_minor(20000).unwrap();
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Upper bound for a tax rate: 100%.
pub const MAX_TAX_RATE_BPS: i64 = 10_000;

/// Length of an Indian GST identification number.
pub const GSTIN_LENGTH: usize = 15;

// =============================================================================
// String Validators
// =============================================================================

fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Laptop Stand").is_ok());
/// assert!(validate_product_name("").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name, 200)
}

/// Validates a customer name (1-100 characters).
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name, 100)
}

/// Validates an entity reference (owner, customer, product id).
pub fn validate_reference(field: &str, id: &str) -> ValidationResult<()> {
    validate_name(field, id, 64)
}

/// Validates an optional GSTIN.
///
/// ## Rules
/// - Absent or blank is fine
/// - Otherwise exactly 15 ASCII letters or digits
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_gstin;
///
/// assert!(validate_gstin(None).is_ok());
/// assert!(validate_gstin(Some("27AAPFU0939F1ZV")).is_ok());
/// assert!(validate_gstin(Some("27AAPFU")).is_err());
/// ```
pub fn validate_gstin(gstin: Option<&str>) -> ValidationResult<()> {
    let gstin = match gstin.map(str::trim) {
        Some(g) if !g.is_empty() => g,
        _ => return Ok(()),
    };

    if gstin.len() != GSTIN_LENGTH || !gstin.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "gstin".to_string(),
            reason: format!("must be {} letters or digits", GSTIN_LENGTH),
        });
    }

    Ok(())
}

/// Validates invoice-number search text.
///
/// ## Rules
/// - Can be empty (matches everything)
/// - Maximum 50 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 50,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in minor units.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_price_minor;
///
/// assert!(validate_price_minor(1099).is_ok());
/// assert!(validate_price_minor(0).is_ok());
/// assert!(validate_price_minor(-100).is_err());
/// ```
pub fn validate_price_minor(minor: i64) -> ValidationResult<()> {
    if minor < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: i64) -> ValidationResult<()> {
    if !(0..=MAX_TAX_RATE_BPS).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate_bps".to_string(),
            min: 0,
            max: MAX_TAX_RATE_BPS,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Laptop Stand").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_customer_name() {
        assert!(validate_customer_name("Acme Traders").is_ok());
        assert!(validate_customer_name(&"B".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_reference() {
        assert!(validate_reference("owner_id", "user-1").is_ok());
        let err = validate_reference("customer_id", " ").unwrap_err();
        assert_eq!(err.to_string(), "customer_id is required");
    }

    #[test]
    fn test_validate_gstin() {
        assert!(validate_gstin(None).is_ok());
        assert!(validate_gstin(Some("")).is_ok());
        assert!(validate_gstin(Some("27AAPFU0939F1ZV")).is_ok());
        assert!(validate_gstin(Some("27AAPFU0939F1Z")).is_err());
        assert!(validate_gstin(Some("27AAPFU0939F1Z-")).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  INV-2024 ").unwrap(), "INV-2024");
        assert_eq!(validate_search_query("").unwrap(), "");
        assert!(validate_search_query(&"9".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_price_minor() {
        assert!(validate_price_minor(0).is_ok());
        assert!(validate_price_minor(1099).is_ok());
        assert!(validate_price_minor(-100).is_err());
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(0).is_ok());
        assert!(validate_tax_rate_bps(1800).is_ok());
        assert!(validate_tax_rate_bps(10000).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
        assert!(validate_tax_rate_bps(-1).is_err());
    }
}
