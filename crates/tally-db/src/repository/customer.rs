//! # Customer Repository
//!
//! Database operations for billed customers.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tally_core::validation::{validate_customer_name, validate_gstin};
use tally_core::{CoreError, Customer};

const CUSTOMER_COLUMNS: &str = "id, owner_id, name, email, phone, address, gstin, created_at";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    owner_id: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    gstin: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            gstin: row.gstin,
            created_at: row.created_at,
        }
    }
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a new customer. GSTIN is stored upper-cased.
    pub async fn insert(&self, customer: &Customer) -> DbResult<Customer> {
        validate_customer_name(&customer.name).map_err(CoreError::from)?;
        validate_gstin(customer.gstin.as_deref()).map_err(CoreError::from)?;

        debug!(id = %customer.id, name = %customer.name, "Inserting customer");

        let mut stored = customer.clone();
        stored.name = stored.name.trim().to_string();
        stored.gstin = stored
            .gstin
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_uppercase);

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, owner_id, name, email, phone, address, gstin, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.owner_id)
        .bind(&stored.name)
        .bind(&stored.email)
        .bind(&stored.phone)
        .bind(&stored.address)
        .bind(&stored.gstin)
        .bind(stored.created_at)
        .execute(&self.pool)
        .await?;

        Ok(stored)
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let row: Option<CustomerRow> =
            sqlx::query_as(&format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Customer::from))
    }

    /// Lists an owner's customers, sorted by name.
    pub async fn list(&self, owner_id: &str) -> DbResult<Vec<Customer>> {
        let rows: Vec<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {} FROM customers WHERE owner_id = ?1 ORDER BY name",
            CUSTOMER_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }

    /// Counts total customers (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::generate_id;

    fn customer(owner: &str, name: &str, gstin: Option<&str>) -> Customer {
        Customer {
            id: generate_id(),
            owner_id: owner.to_string(),
            name: name.to_string(),
            email: Some("billing@example.com".to_string()),
            phone: None,
            address: Some("12 MG Road, Pune".to_string()),
            gstin: gstin.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let c = customer("u-1", "  Acme Traders ", Some("27aapfu0939f1zv"));
        let stored = repo.insert(&c).await.unwrap();
        assert_eq!(stored.name, "Acme Traders");
        assert_eq!(stored.gstin.as_deref(), Some("27AAPFU0939F1ZV"));

        let loaded = repo.get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, stored.name);
        assert_eq!(loaded.gstin, stored.gstin);
        assert_eq!(loaded.address, stored.address);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_bad_gstin() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .customers()
            .insert(&customer("u-1", "Acme", Some("SHORT")))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        repo.insert(&customer("u-1", "Beta", None)).await.unwrap();
        repo.insert(&customer("u-1", "Alpha", None)).await.unwrap();
        repo.insert(&customer("u-2", "Gamma", None)).await.unwrap();

        let names: Vec<String> = repo
            .list("u-1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
        assert_eq!(repo.count().await.unwrap(), 3);
    }
}
