//! # Error Types
//!
//! Storage and configuration failures of `tally-db`.
//!
//! ## From SQLite to callers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error                                                            │
//! │   ├── Database(e), by e.kind():                                         │
//! │   │     UniqueViolation      → DbError::UniqueViolation { table.col }  │
//! │   │     ForeignKeyViolation  → DbError::ForeignKeyViolation            │
//! │   │     CheckViolation       → DbError::CheckViolation                 │
//! │   │     other                → DbError::QueryFailed                    │
//! │   ├── PoolTimedOut           → DbError::PoolExhausted                  │
//! │   ├── PoolClosed             → DbError::ConnectionFailed               │
//! │   └── anything else          → DbError::Internal                       │
//! │                                                                         │
//! │  DbError ──► CoreError at the BillingService boundary                  │
//! │   ├── duplicate invoices.invoice_number → DuplicateIdentifier (retry)  │
//! │   ├── Domain(e)                         → e                            │
//! │   └── everything else                   → Storage(message)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::error::ErrorKind;
use tally_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// `field` is SQLite's `table.column`, e.g. `invoices.invoice_number`.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// An invoice pointing at a customer that doesn't exist.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A schema CHECK (negative price, zero quantity) rejected the row.
    #[error("Check constraint failed: {message}")]
    CheckViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A domain rule failed while validating input or rebuilding stored rows.
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True for a unique violation on the given column.
    pub fn is_duplicate_of(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.ends_with(column))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => unique_violation(&message),
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    ErrorKind::CheckViolation => DbError::CheckViolation { message },
                    // without extended result codes only the message tells
                    _ if message.starts_with(UNIQUE_PREFIX) => unique_violation(&message),
                    _ if message.contains("FOREIGN KEY constraint failed") => {
                        DbError::ForeignKeyViolation { message }
                    }
                    _ if message.starts_with("CHECK constraint failed") => {
                        DbError::CheckViolation { message }
                    }
                    _ => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            other => DbError::Internal(other.to_string()),
        }
    }
}

const UNIQUE_PREFIX: &str = "UNIQUE constraint failed: ";

/// "UNIQUE constraint failed: invoices.invoice_number" → field `invoices.invoice_number`.
fn unique_violation(message: &str) -> DbError {
    let field = message.strip_prefix(UNIQUE_PREFIX).unwrap_or(message);
    DbError::duplicate(field, "unknown")
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Storage failures as seen by invoice callers.
impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation { ref field, ref value } if field.ends_with("invoice_number") => {
                CoreError::DuplicateIdentifier(value.clone())
            }
            DbError::Domain(inner) => inner,
            other => CoreError::Storage(other.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors loading or validating `tally.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config file: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[test]
    fn test_duplicate_invoice_number_maps_to_duplicate_identifier() {
        let err = DbError::duplicate("invoices.invoice_number", "INV-000001");
        assert!(err.is_duplicate_of("invoice_number"));

        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::DuplicateIdentifier(n) if n == "INV-000001"));
    }

    #[test]
    fn test_other_errors_map_to_storage() {
        let core: CoreError = DbError::PoolExhausted.into();
        assert!(matches!(core, CoreError::Storage(_)));

        let core: CoreError = DbError::duplicate("customers.id", "c-1").into();
        assert!(matches!(core, CoreError::Storage(_)));
    }

    #[test]
    fn test_domain_error_passes_through() {
        let core: CoreError = DbError::Domain(CoreError::EmptyInvoice).into();
        assert!(matches!(core, CoreError::EmptyInvoice));
    }

    #[tokio::test]
    async fn test_sqlite_constraints_are_classified() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let insert_customer =
            "INSERT INTO customers (id, owner_id, name, created_at) VALUES ('c-1', 'u-1', 'Acme', '2024-01-01T00:00:00Z')";

        sqlx::query(insert_customer).execute(db.pool()).await.unwrap();
        let err: DbError = sqlx::query(insert_customer)
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(&err, DbError::UniqueViolation { field, .. } if field == "customers.id"));
        assert!(!err.is_duplicate_of("invoice_number"));

        let err: DbError = sqlx::query(
            "INSERT INTO products (id, owner_id, name, price_minor, tax_rate_bps, created_at) \
             VALUES ('p-1', 'u-1', 'Broken', -5, 0, '2024-01-01T00:00:00Z')",
        )
        .execute(db.pool())
        .await
        .unwrap_err()
        .into();
        assert!(matches!(err, DbError::CheckViolation { .. }));

        let err: DbError = sqlx::query(
            "INSERT INTO invoices (invoice_number, owner_id, customer_id, invoice_date, created_at, \
             subtotal_minor, total_tax_minor, grand_total_minor) \
             VALUES ('INV-1', 'u-1', 'ghost', '2024-01-01', '2024-01-01T00:00:00Z', 0, 0, 0)",
        )
        .execute(db.pool())
        .await
        .unwrap_err()
        .into();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
