//! # Invoice Assembly
//!
//! Turns a customer, an owner and a list of line requests into a fully
//! computed [`Invoice`].
//!
//! ## Creation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_invoice(customer, owner, [LineRequest], products, ids, now)    │
//! │       │                                                                 │
//! │       ├── no lines?            → EmptyInvoice                           │
//! │       │                                                                 │
//! │       ├── for each request (in order):                                  │
//! │       │     products.product(id) ── missing → ProductNotFound           │
//! │       │     LineItem::compute(snapshot, qty) ── bad qty/rate → error    │
//! │       │                                                                 │
//! │       ├── totals = Σ taxable, Σ tax, subtotal + tax                     │
//! │       │                                                                 │
//! │       └── number = ids.next_identifier()                                │
//! │                                                                         │
//! │  Any failure aborts: no partially built invoice ever escapes.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Replacing lines follows the same path and keeps the number, the invoice
//! date and the creation timestamp.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::BuildHasher;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::identifier::InvoiceIdentifierGenerator;
use crate::line_item::{LineItem, LineRequest};
use crate::money::Money;
use crate::types::Product;
use crate::validation::validate_reference;

// =============================================================================
// Product Lookup
// =============================================================================

/// Resolves a product id to the product being invoiced.
pub trait ProductLookup {
    fn product(&self, id: &str) -> Option<&Product>;
}

impl<S: BuildHasher> ProductLookup for HashMap<String, Product, S> {
    fn product(&self, id: &str) -> Option<&Product> {
        self.get(id)
    }
}

impl ProductLookup for [Product] {
    fn product(&self, id: &str) -> Option<&Product> {
        self.iter().find(|p| p.id == id)
    }
}

impl ProductLookup for Vec<Product> {
    fn product(&self, id: &str) -> Option<&Product> {
        self.as_slice().product(id)
    }
}

// =============================================================================
// Invoice Types
// =============================================================================

/// A creation request as submitted by the invoice form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceRequest {
    pub customer_id: String,
    pub lines: Vec<LineRequest>,
}

/// Identity and ownership of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceHeader {
    /// Invoice number, unique in storage.
    pub number: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    pub customer_id: String,
}

/// Invoice roll-up.
///
/// `grand_total == subtotal + total_tax` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[ts(export)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub total_tax: Money,
    pub grand_total: Money,
}

impl InvoiceTotals {
    /// Sums the lines left to right. No lines gives all-zero totals.
    ///
    /// Fails with [`CoreError::AmountOutOfRange`] if a sum overflows.
    pub fn from_lines(lines: &[LineItem]) -> CoreResult<Self> {
        let subtotal = checked_sum(lines.iter().map(LineItem::taxable_amount), "subtotal")?;
        let total_tax = checked_sum(lines.iter().map(LineItem::tax_amount), "total_tax")?;
        let grand_total = subtotal
            .checked_add(total_tax)
            .ok_or(CoreError::AmountOutOfRange { field: "grand_total" })?;

        Ok(Self {
            subtotal,
            total_tax,
            grand_total,
        })
    }
}

fn checked_sum(mut amounts: impl Iterator<Item = Money>, field: &'static str) -> CoreResult<Money> {
    amounts.try_fold(Money::zero(), |acc, amount| {
        acc.checked_add(amount)
            .ok_or(CoreError::AmountOutOfRange { field })
    })
}

/// A computed invoice.
///
/// Fields are private: lines and totals only change together, through
/// [`replace_lines`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Invoice {
    #[serde(flatten)]
    header: InvoiceHeader,
    lines: Vec<LineItem>,
    #[serde(flatten)]
    totals: InvoiceTotals,
}

impl Invoice {
    /// Rebuilds an invoice from stored parts, recomputing the totals.
    ///
    /// Accepts zero lines: creation and line replacement reject an empty
    /// request, but a legacy row without lines still has to load and report
    /// as a zero-total invoice.
    pub fn restore(header: InvoiceHeader, lines: Vec<LineItem>) -> CoreResult<Self> {
        let totals = InvoiceTotals::from_lines(&lines)?;
        Ok(Self {
            header,
            lines,
            totals,
        })
    }

    /// Same invoice under a different number. Used when storage rejects a
    /// duplicate.
    pub fn renumbered(mut self, number: String) -> Self {
        self.header.number = number;
        self
    }

    pub fn header(&self) -> &InvoiceHeader {
        &self.header
    }

    pub fn number(&self) -> &str {
        &self.header.number
    }

    pub fn invoice_date(&self) -> NaiveDate {
        self.header.invoice_date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.header.created_at
    }

    pub fn owner_id(&self) -> &str {
        &self.header.owner_id
    }

    pub fn customer_id(&self) -> &str {
        &self.header.customer_id
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn totals(&self) -> InvoiceTotals {
        self.totals
    }

    pub fn subtotal(&self) -> Money {
        self.totals.subtotal
    }

    pub fn total_tax(&self) -> Money {
        self.totals.total_tax
    }

    pub fn grand_total(&self) -> Money {
        self.totals.grand_total
    }
}

// =============================================================================
// Assembly
// =============================================================================

fn compute_lines<P>(requests: &[LineRequest], products: &P) -> CoreResult<Vec<LineItem>>
where
    P: ProductLookup + ?Sized,
{
    if requests.is_empty() {
        return Err(CoreError::EmptyInvoice);
    }

    requests
        .iter()
        .map(|req| {
            let product = products
                .product(&req.product_id)
                .ok_or_else(|| CoreError::ProductNotFound(req.product_id.clone()))?;
            LineItem::compute(product.snapshot(), req.quantity)
        })
        .collect()
}

/// Builds a new invoice dated `now`.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use tally_core::identifier::SequentialIdentifierGenerator;
/// use tally_core::invoice::create_invoice;
/// use tally_core::line_item::LineRequest;
/// use tally_core::types::Product;
///
/// let products = vec![Product {
///     id: "p-1".into(),
///     owner_id: "u-1".into(),
///     name: "Widget".into(),
///     description: None,
///     hsn_code: None,
///     price_minor: 20000,
///     tax_rate_bps: 1800,
///     created_at: Utc::now(),
/// }];
/// let ids = SequentialIdentifierGenerator::new("INV");
///
/// let invoice = create_invoice(
///     "c-1",
///     "u-1",
///     &[LineRequest::new("p-1", 2)],
///     &products,
///     &ids,
///     Utc::now(),
/// )
/// .unwrap();
///
/// assert_eq!(invoice.number(), "INV-000001");
/// assert_eq!(invoice.grand_total().to_string(), "472.00");
/// ```
pub fn create_invoice<P>(
    customer_id: &str,
    owner_id: &str,
    requests: &[LineRequest],
    products: &P,
    ids: &dyn InvoiceIdentifierGenerator,
    now: DateTime<Utc>,
) -> CoreResult<Invoice>
where
    P: ProductLookup + ?Sized,
{
    validate_reference("customer_id", customer_id)?;
    validate_reference("owner_id", owner_id)?;

    let lines = compute_lines(requests, products)?;
    let header = InvoiceHeader {
        number: ids.next_identifier(),
        invoice_date: now.date_naive(),
        created_at: now,
        owner_id: owner_id.to_string(),
        customer_id: customer_id.to_string(),
    };

    Invoice::restore(header, lines)
}

/// Recomputes an invoice with a new set of lines.
///
/// The original is untouched; on failure nothing changes.
pub fn replace_lines<P>(invoice: &Invoice, requests: &[LineRequest], products: &P) -> CoreResult<Invoice>
where
    P: ProductLookup + ?Sized,
{
    let lines = compute_lines(requests, products)?;
    Invoice::restore(invoice.header.clone(), lines)
}

// =============================================================================
// Unit Tests
// =============================================================================
