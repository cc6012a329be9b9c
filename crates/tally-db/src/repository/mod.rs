//! # Repository Module
//!
//! Database repository implementations for Tally.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  BillingService                                                        │
//! │       │                                                                 │
//! │       │  db.invoices().find_by_owner("u-1")                            │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │  ├── insert(&self, invoice)          (invoice + lines, one tx)         │
//! │  ├── get_by_number(&self, number)                                      │
//! │  ├── find_by_owner(&self, owner)                                       │
//! │  └── replace_lines(&self, invoice)                                     │
//! │       │                                                                 │
//! │       │  SQL Query → row structs (FromRow)                             │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  rows → tally-core types (lines recomputed on load)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product catalog
//! - [`CustomerRepository`](customer::CustomerRepository) - Billed customers
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoices and their lines

pub mod customer;
pub mod invoice;
pub mod product;

use uuid::Uuid;

/// Generates a new row ID (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
