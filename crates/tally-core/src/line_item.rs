//! # Line Items
//!
//! One invoice line: a frozen product snapshot, a quantity and the three
//! amounts derived from them.
//!
//! ## Line Calculation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  unit_price = 200.00   quantity = 2   tax_rate = 18%                   │
//! │                                                                         │
//! │  taxable    = unit_price × quantity        = 400.00  (exact)           │
//! │  tax        = taxable × rate / 100         =  72.00  (half-up)         │
//! │  line_total = taxable + tax                = 472.00  (exact)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines are immutable. Changing an invoice means computing a new set of
//! lines, never editing one in place.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{ProductSnapshot, TaxRate};
use crate::validation::validate_price_minor;

// =============================================================================
// Line Request
// =============================================================================

/// What the caller asks for: a product and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

impl LineRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Line Calculator
// =============================================================================

/// The derived amounts of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub taxable_amount: Money,
    pub tax_amount: Money,
    pub line_total: Money,
}

/// Computes taxable amount, tax and line total.
///
/// ## Errors
/// - [`CoreError::InvalidQuantity`] when `quantity < 1`
/// - [`CoreError::InvalidRate`] when `tax_rate_bps` is outside `0..=TaxRate::MAX_BPS`
/// - [`CoreError::Validation`] when the unit price is negative
/// - [`CoreError::AmountOutOfRange`] when an amount overflows minor units
///
/// ## Example
/// ```rust
/// use tally_core::line_item::calculate_line;
/// use tally_core::money::Money;
///
/// let amounts = calculate_line(Money::from_minor(20000), 2, 1800).unwrap();
/// assert_eq!(amounts.taxable_amount.to_string(), "400.00");
/// assert_eq!(amounts.tax_amount.to_string(), "72.00");
/// assert_eq!(amounts.line_total.to_string(), "472.00");
/// ```
pub fn calculate_line(unit_price: Money, quantity: i64, tax_rate_bps: i64) -> CoreResult<LineAmounts> {
    if quantity < 1 {
        return Err(CoreError::InvalidQuantity { quantity });
    }
    let rate = TaxRate::try_from_bps(tax_rate_bps)?;
    validate_price_minor(unit_price.minor())?;

    let taxable_amount = unit_price
        .multiply_quantity(quantity)
        .ok_or(CoreError::AmountOutOfRange { field: "taxable_amount" })?;
    let tax_amount = taxable_amount
        .percentage_of(rate)
        .ok_or(CoreError::AmountOutOfRange { field: "tax_amount" })?;
    let line_total = taxable_amount
        .checked_add(tax_amount)
        .ok_or(CoreError::AmountOutOfRange { field: "line_total" })?;

    Ok(LineAmounts {
        taxable_amount,
        tax_amount,
        line_total,
    })
}

// =============================================================================
// Line Item
// =============================================================================

/// A computed invoice line.
///
/// Uses the snapshot pattern: name, price and rate are copied from the
/// product when the line is computed and never re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct LineItem {
    product_id: String,
    product_name: String,
    unit_price: Money,
    tax_rate: TaxRate,
    quantity: i64,
    taxable_amount: Money,
    tax_amount: Money,
    line_total: Money,
}

impl LineItem {
    /// Computes a line from a product snapshot.
    ///
    /// This is the only way to build a `LineItem`, so every line (fresh or
    /// loaded from storage) satisfies `line_total = taxable + tax`.
    pub fn compute(snapshot: ProductSnapshot, quantity: i64) -> CoreResult<Self> {
        let amounts = calculate_line(snapshot.unit_price, quantity, snapshot.tax_rate_bps)?;
        let tax_rate = TaxRate::try_from_bps(snapshot.tax_rate_bps)?;

        Ok(Self {
            product_id: snapshot.product_id,
            product_name: snapshot.product_name,
            unit_price: snapshot.unit_price,
            tax_rate,
            quantity,
            taxable_amount: amounts.taxable_amount,
            tax_amount: amounts.tax_amount,
            line_total: amounts.line_total,
        })
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn taxable_amount(&self) -> Money {
        self.taxable_amount
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn line_total(&self) -> Money {
        self.line_total
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
