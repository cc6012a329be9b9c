//! # tally-db: Storage and Orchestration for Tally
//!
//! SQLite persistence, configuration and the billing service around the
//! pure `tally-core` engine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  Caller (HTTP handler, CLI, seed binary)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ BillingService│───►│  Repositories │───►│   Database   │  │   │
//! │  │   │ (billing.rs)  │    │ product.rs    │    │  (pool.rs)   │  │   │
//! │  │   │ retry, report │    │ customer.rs   │    │  SqlitePool  │  │   │
//! │  │   └───────┬───────┘    │ invoice.rs    │    └──────────────┘  │   │
//! │  │           │            └───────────────┘                       │   │
//! │  │           ▼                                                    │   │
//! │  │   tally-core: line math, totals, breakdown, revenue buckets    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (tally.db) with embedded migrations                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`billing`] - Invoice creation with number retry, reporting
//! - [`config`] - `tally.toml` loading with `TALLY_*` overrides
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and configuration error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{BillingService, Database, TallyConfig};
//!
//! let config = TallyConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//! let billing = BillingService::from_config(db, &config);
//!
//! let invoice = billing.create_invoice("u-1", &request).await?;
//! let series = billing.revenue(&RevenueScope::owner("u-1"), Granularity::Month).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use billing::BillingService;
pub use config::TallyConfig;
pub use error::{ConfigError, DbError, DbResult};
pub use pool::{Database, DbConfig, TableCounts};

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::product::ProductRepository;
