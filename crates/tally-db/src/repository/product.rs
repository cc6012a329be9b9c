//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Batch Lookup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Invoice form submits 3 lines: [p-1 × 2, p-7 × 1, p-1 × 5]             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  get_many([p-1, p-7])  ← one query, duplicates collapsed               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  HashMap<id, Product>  ← implements ProductLookup for tally-core       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::validation::{validate_price_minor, validate_product_name, validate_tax_rate_bps};
use tally_core::{CoreError, Product};

const PRODUCT_COLUMNS: &str =
    "id, owner_id, name, description, hsn_code, price_minor, tax_rate_bps, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    owner_id: String,
    name: String,
    description: Option<String>,
    hsn_code: Option<String>,
    price_minor: i64,
    tax_rate_bps: i64,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            hsn_code: row.hsn_code,
            price_minor: row.price_minor,
            tax_rate_bps: row.tax_rate_bps,
            created_at: row.created_at,
        }
    }
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product after validating name, price and rate.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - ID already exists
    /// * `Err(DbError::Domain)` - Validation failed
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_product_name(&product.name).map_err(CoreError::from)?;
        validate_price_minor(product.price_minor).map_err(CoreError::from)?;
        validate_tax_rate_bps(product.tax_rate_bps).map_err(CoreError::from)?;

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, owner_id, name, description, hsn_code,
                price_minor, tax_rate_bps, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.owner_id)
        .bind(product.name.trim())
        .bind(&product.description)
        .bind(&product.hsn_code)
        .bind(product.price_minor)
        .bind(product.tax_rate_bps)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Product::from))
    }

    /// Loads every listed product in one query.
    ///
    /// Missing ids are simply absent from the map; the invoice assembler
    /// reports them as `ProductNotFound`.
    pub async fn get_many<S: AsRef<str>>(&self, ids: &[S]) -> DbResult<HashMap<String, Product>> {
        let unique: BTreeSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        debug!(count = unique.len(), "Batch loading products");

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM products WHERE id IN (", PRODUCT_COLUMNS));
        let mut separated = builder.separated(", ");
        for id in &unique {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<ProductRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id.clone(), Product::from(row)))
            .collect())
    }

    /// Lists an owner's products, sorted by name.
    pub async fn list(&self, owner_id: &str) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE owner_id = ?1 ORDER BY name",
            PRODUCT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Returns `NotFound` unless the product exists.
    pub async fn require(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
