//! # tally-core: Invoice Computation & Revenue Aggregation
//!
//! This crate is the **heart** of Tally. It turns line requests into
//! financially correct invoices and invoices into dashboard figures, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Presentation (forms, dashboards, PDF export)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON / generated TS types              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               tally-db (BillingService, repositories)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   money ─► line_item ─► invoice ─► breakdown                    │   │
//! │  │                            │                                    │   │
//! │  │                 identifier ┘        └─► revenue                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO LOGGING • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`types`] - TaxRate, Product, Customer
//! - [`line_item`] - Per-line tax calculation
//! - [`invoice`] - Invoice assembly and line replacement
//! - [`breakdown`] - Per-rate tax summary
//! - [`revenue`] - Revenue series, statistics, filtering
//! - [`identifier`] - Invoice number generation
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::types::TaxRate;
//!
//! let taxable = Money::from_minor(20000).multiply_quantity(2).unwrap();
//! let tax = taxable.percentage_of(TaxRate::from_bps(1800)).unwrap();
//!
//! assert_eq!(tax.to_string(), "72.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod breakdown;
pub mod error;
pub mod identifier;
pub mod invoice;
pub mod line_item;
pub mod money;
pub mod revenue;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use breakdown::{breakdown, breakdown_rows, TaxBreakdown, TaxBreakdownRow};
pub use error::{CoreError, CoreResult, ValidationError};
pub use identifier::{
    IdentifierStrategy, InvoiceIdentifierGenerator, SequentialIdentifierGenerator,
    TimestampIdentifierGenerator,
};
pub use invoice::{
    create_invoice, replace_lines, Invoice, InvoiceHeader, InvoiceRequest, InvoiceTotals,
    ProductLookup,
};
pub use line_item::{calculate_line, LineAmounts, LineItem, LineRequest};
pub use money::Money;
pub use revenue::{
    aggregate_by_period, summary_statistics, Granularity, InvoiceFilter, InvoiceStatistics,
    MonthBucketing, RevenuePoint, RevenueScope,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Invoice number prefix when none is configured.
pub const DEFAULT_INVOICE_PREFIX: &str = "INV";

/// How many fresh numbers to try before giving up on a duplicate.
pub const DEFAULT_MAX_IDENTIFIER_ATTEMPTS: u32 = 5;
