//! # Invoice Repository
//!
//! Database operations for invoices and their line items.
//!
//! ## Storage Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  invoices                          invoice_items                        │
//! │  ─────────                         ─────────────                        │
//! │  invoice_number (PK, unique) ◄──── invoice_number (FK, cascade)        │
//! │  owner_id, customer_id             position                             │
//! │  invoice_date, created_at          product snapshot (name/price/rate)  │
//! │  subtotal / tax / grand total      quantity + computed amounts         │
//! │                                                                         │
//! │  Writes: header and lines in ONE transaction                           │
//! │  Reads:  lines are recomputed from the snapshot through tally-core,    │
//! │          totals re-rolled; stored amounts are only cross-checked       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use tally_core::validation::validate_search_query;
use tally_core::{CoreError, Invoice, InvoiceHeader, LineItem, Money, ProductSnapshot};

const INVOICE_COLUMNS: &str = "invoice_number, owner_id, customer_id, invoice_date, created_at, \
     subtotal_minor, total_tax_minor, grand_total_minor";

/// Newest first: by invoice date, then creation time.
const NEWEST_FIRST: &str = "ORDER BY invoice_date DESC, created_at DESC, invoice_number DESC";

/// Invoice numbers bound per line-item query. SQLite limits bound
/// parameters per statement (999 on older builds).
const LINE_QUERY_BATCH: usize = 500;

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    invoice_number: String,
    owner_id: String,
    customer_id: String,
    invoice_date: NaiveDate,
    created_at: DateTime<Utc>,
    subtotal_minor: i64,
    total_tax_minor: i64,
    grand_total_minor: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceItemRow {
    invoice_number: String,
    product_id: String,
    product_name: String,
    unit_price_minor: i64,
    tax_rate_bps: i64,
    quantity: i64,
    line_total_minor: i64,
}

impl InvoiceItemRow {
    /// Rebuilds the line through the calculator.
    fn into_line_item(self) -> Result<LineItem, CoreError> {
        let stored_total = self.line_total_minor;
        let line = LineItem::compute(
            ProductSnapshot {
                product_id: self.product_id,
                product_name: self.product_name,
                unit_price: Money::from_minor(self.unit_price_minor),
                tax_rate_bps: self.tax_rate_bps,
            },
            self.quantity,
        )?;

        if line.line_total().minor() != stored_total {
            warn!(
                invoice_number = %self.invoice_number,
                stored = stored_total,
                computed = line.line_total().minor(),
                "Stored line total differs from recomputed value"
            );
        }

        Ok(line)
    }
}

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts an invoice and its lines atomically.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` on `invoices.invoice_number` - the
    ///   number is taken; the caller retries with a fresh one
    /// * `Err(DbError::ForeignKeyViolation)` - customer doesn't exist
    pub async fn insert(&self, invoice: &Invoice) -> DbResult<()> {
        debug!(
            invoice_number = %invoice.number(),
            lines = invoice.lines().len(),
            "Inserting invoice"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_number, owner_id, customer_id, invoice_date, created_at,
                subtotal_minor, total_tax_minor, grand_total_minor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(invoice.number())
        .bind(invoice.owner_id())
        .bind(invoice.customer_id())
        .bind(invoice.invoice_date())
        .bind(invoice.created_at())
        .bind(invoice.subtotal().minor())
        .bind(invoice.total_tax().minor())
        .bind(invoice.grand_total().minor())
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_duplicate_of("invoice_number") => {
                DbError::duplicate("invoices.invoice_number", invoice.number())
            }
            other => other,
        })?;

        insert_items(&mut tx, invoice).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Swaps an invoice's lines and totals for the ones in `invoice`.
    ///
    /// Header fields other than the totals are left as stored.
    pub async fn replace_lines(&self, invoice: &Invoice) -> DbResult<()> {
        debug!(invoice_number = %invoice.number(), "Replacing invoice lines");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                subtotal_minor = ?2,
                total_tax_minor = ?3,
                grand_total_minor = ?4
            WHERE invoice_number = ?1
            "#,
        )
        .bind(invoice.number())
        .bind(invoice.subtotal().minor())
        .bind(invoice.total_tax().minor())
        .bind(invoice.grand_total().minor())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", invoice.number()));
        }

        sqlx::query("DELETE FROM invoice_items WHERE invoice_number = ?1")
            .bind(invoice.number())
            .execute(&mut *tx)
            .await?;

        insert_items(&mut tx, invoice).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes an invoice; its lines go with it (ON DELETE CASCADE).
    pub async fn delete(&self, number: &str) -> DbResult<()> {
        debug!(invoice_number = %number, "Deleting invoice");

        let result = sqlx::query("DELETE FROM invoices WHERE invoice_number = ?1")
            .bind(number)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", number));
        }

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an invoice by its number.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Invoice>> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices WHERE invoice_number = ?1",
            INVOICE_COLUMNS
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// All invoices of one owner, newest first.
    pub async fn find_by_owner(&self, owner_id: &str) -> DbResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices WHERE owner_id = ?1 {}",
            INVOICE_COLUMNS, NEWEST_FIRST
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    /// Every invoice, newest first.
    pub async fn find_all(&self) -> DbResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> =
            sqlx::query_as(&format!("SELECT {} FROM invoices {}", INVOICE_COLUMNS, NEWEST_FIRST))
                .fetch_all(&self.pool)
                .await?;

        self.hydrate(rows).await
    }

    /// An owner's invoices dated within `[start, end]`, newest first.
    pub async fn find_by_owner_between(
        &self,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices \
             WHERE owner_id = ?1 AND invoice_date >= ?2 AND invoice_date <= ?3 {}",
            INVOICE_COLUMNS, NEWEST_FIRST
        ))
        .bind(owner_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    /// An owner's invoices whose number contains `fragment`
    /// (case-insensitive), newest first.
    pub async fn search_by_number(&self, owner_id: &str, fragment: &str) -> DbResult<Vec<Invoice>> {
        let fragment = validate_search_query(fragment).map_err(CoreError::from)?;
        let pattern = format!(
            "%{}%",
            fragment.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
        );

        debug!(owner_id = %owner_id, fragment = %fragment, "Searching invoices by number");

        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices \
             WHERE owner_id = ?1 AND invoice_number LIKE ?2 ESCAPE '\\' {}",
            INVOICE_COLUMNS, NEWEST_FIRST
        ))
        .bind(owner_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    /// Counts total invoices.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Loads the lines for a batch of headers and assembles the invoices,
    /// keeping the header order. A header without lines loads as an empty
    /// invoice.
    async fn hydrate(&self, rows: Vec<InvoiceRow>) -> DbResult<Vec<Invoice>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut lines_by_number: HashMap<String, Vec<LineItem>> = HashMap::new();
        for batch in rows.chunks(LINE_QUERY_BATCH) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT invoice_number, product_id, product_name, unit_price_minor, \
                 tax_rate_bps, quantity, line_total_minor \
                 FROM invoice_items WHERE invoice_number IN (",
            );
            let mut separated = builder.separated(", ");
            for row in batch {
                separated.push_bind(row.invoice_number.clone());
            }
            separated.push_unseparated(") ORDER BY invoice_number, position");

            let items: Vec<InvoiceItemRow> =
                builder.build_query_as().fetch_all(&self.pool).await?;

            for item in items {
                let number = item.invoice_number.clone();
                let line = item.into_line_item()?;
                lines_by_number.entry(number).or_default().push(line);
            }
        }

        debug!(
            invoices = rows.len(),
            batches = rows.len().div_ceil(LINE_QUERY_BATCH),
            "Loaded invoice lines"
        );

        rows.into_iter()
            .map(|row| {
                let lines = lines_by_number.remove(&row.invoice_number).unwrap_or_default();
                let stored_grand_total = row.grand_total_minor;
                let header = InvoiceHeader {
                    number: row.invoice_number,
                    invoice_date: row.invoice_date,
                    created_at: row.created_at,
                    owner_id: row.owner_id,
                    customer_id: row.customer_id,
                };
                let invoice = Invoice::restore(header, lines)?;

                if invoice.grand_total().minor() != stored_grand_total
                    || invoice.subtotal().minor() != row.subtotal_minor
                    || invoice.total_tax().minor() != row.total_tax_minor
                {
                    warn!(
                        invoice_number = %invoice.number(),
                        stored = stored_grand_total,
                        computed = invoice.grand_total().minor(),
                        "Stored invoice totals differ from recomputed values"
                    );
                }

                Ok(invoice)
            })
            .collect()
    }
}

/// Writes every line of `invoice` with its position.
async fn insert_items(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    for (position, line) in invoice.lines().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                invoice_number, position, product_id, product_name,
                unit_price_minor, tax_rate_bps, quantity,
                taxable_amount_minor, tax_amount_minor, line_total_minor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(invoice.number())
        .bind(position as i64)
        .bind(line.product_id())
        .bind(line.product_name())
        .bind(line.unit_price().minor())
        .bind(line.tax_rate().bps() as i64)
        .bind(line.quantity())
        .bind(line.taxable_amount().minor())
        .bind(line.tax_amount().minor())
        .bind(line.line_total().minor())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
