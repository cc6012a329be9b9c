//! # Seed Data Generator
//!
//! Populates the database with demo customers, products and invoices, then
//! prints the revenue reports built from them.
//!
//! ## Usage
//! ```bash
//! # 200 invoices into ./tally_dev.db (default)
//! cargo run -p tally-db --bin seed
//!
//! # Custom amount and location
//! cargo run -p tally-db --bin seed -- --invoices 1000 --db ./data/tally.db
//!
//! # More logging
//! RUST_LOG=tally_db=debug cargo run -p tally-db --bin seed
//! ```
//!
//! ## Generated Data
//! - 3 owners, each with a handful of customers
//! - Products at every GST slab: 0%, 5%, 12%, 18%, 28%
//! - Invoices spread over the last two years, 1-4 lines each
//!
//! Numbering and month bucketing come from `tally.toml` (or defaults).

use chrono::{Duration, TimeZone, Utc};
use std::env;
use tally_core::{Customer, Granularity, InvoiceRequest, LineRequest, Product, RevenueScope};
use tally_db::{BillingService, Database, TallyConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const OWNERS: &[&str] = &["owner-north", "owner-south", "owner-west"];

const CUSTOMERS: &[&str] = &[
    "Sharma Electronics",
    "Patel Hardware",
    "Gupta Textiles",
    "Iyer Stationers",
    "Khan Auto Parts",
    "Reddy Pharma",
    "Das Furnishings",
    "Mehta Traders",
    "Nair Spices",
];

/// (name, HSN code, price in paise, rate in bps)
const PRODUCTS: &[(&str, &str, i64, i64)] = &[
    ("Fresh Milk 1L", "0401", 6_000, 0),
    ("Basmati Rice 5kg", "1006", 72_500, 500),
    ("Packaged Tea 500g", "0902", 24_000, 500),
    ("Butter 500g", "0405", 27_500, 1200),
    ("Mobile Phone Case", "3926", 49_900, 1200),
    ("Office Chair", "9401", 649_900, 1800),
    ("LED Monitor 24in", "8528", 1_149_900, 1800),
    ("Printer Paper A4", "4802", 32_000, 1800),
    ("Air Conditioner 1.5T", "8415", 3_899_000, 2800),
    ("Aerated Drink 750ml", "2202", 4_000, 2800),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut invoice_count: usize = 200;
    let mut db_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--invoices" | "-n" => {
                if i + 1 < args.len() {
                    invoice_count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --invoices <N>  Number of invoices to generate (default: 200)");
                println!("  -d, --db <PATH>     Database file path (default: ./tally_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = TallyConfig::load_or_default(None);
    config.database.path = db_path.unwrap_or_else(|| "./tally_dev.db".to_string()).into();

    info!(
        database = %config.database.path.display(),
        invoices = invoice_count,
        strategy = %config.invoicing.identifier_strategy,
        "Seeding Tally database"
    );

    let db = Database::new(config.db_config()).await?;

    let existing = db.invoices().count().await?;
    if existing > 0 {
        warn!(
            existing,
            "Database already has invoices; skipping seed. Delete the file to regenerate."
        );
        return Ok(());
    }

    // Catalog and customers, per owner
    let mut customers_by_owner: Vec<(&str, Vec<String>)> = Vec::new();
    let mut products_by_owner: Vec<Vec<String>> = Vec::new();

    for (owner_idx, owner) in OWNERS.iter().enumerate() {
        let mut customer_ids = Vec::new();
        for (idx, name) in CUSTOMERS.iter().enumerate().filter(|(idx, _)| idx % OWNERS.len() == owner_idx) {
            let customer = Customer {
                id: Uuid::new_v4().to_string(),
                owner_id: owner.to_string(),
                name: name.to_string(),
                email: Some(format!("accounts{}@example.in", idx)),
                phone: None,
                address: None,
                gstin: None,
                created_at: Utc::now(),
            };
            db.customers().insert(&customer).await?;
            customer_ids.push(customer.id);
        }

        let mut product_ids = Vec::new();
        for (name, hsn, price_minor, tax_rate_bps) in PRODUCTS {
            let product = Product {
                id: Uuid::new_v4().to_string(),
                owner_id: owner.to_string(),
                name: name.to_string(),
                description: None,
                hsn_code: Some(hsn.to_string()),
                price_minor: *price_minor,
                tax_rate_bps: *tax_rate_bps,
                created_at: Utc::now(),
            };
            db.products().insert(&product).await?;
            product_ids.push(product.id);
        }

        customers_by_owner.push((*owner, customer_ids));
        products_by_owner.push(product_ids);
    }

    let counts = db.counts().await?;
    info!(customers = counts.customers, products = counts.products, "Catalog ready");

    // Invoices
    let billing = BillingService::from_config(db.clone(), &config);
    let start = std::time::Instant::now();
    let origin = Utc.with_ymd_and_hms(2023, 1, 1, 9, 0, 0).single().unwrap_or_else(Utc::now);
    let mut generated = 0usize;

    for seed in 0..invoice_count {
        let owner_idx = seed % OWNERS.len();
        let (owner, customer_ids) = &customers_by_owner[owner_idx];
        let product_ids = &products_by_owner[owner_idx];

        let line_count = 1 + (seed * 7) % 4;
        let lines = (0..line_count)
            .map(|l| {
                let product = &product_ids[(seed * 3 + l * 5) % product_ids.len()];
                LineRequest::new(product.clone(), 1 + ((seed + l) % 5) as i64)
            })
            .collect();

        let request = InvoiceRequest {
            customer_id: customer_ids[(seed / OWNERS.len()) % customer_ids.len()].clone(),
            lines,
        };

        // Roughly two years of history
        let issued = origin + Duration::hours(((seed * 97) % (730 * 24)) as i64);

        match billing.create_invoice_at(owner, &request, issued).await {
            Ok(_) => generated += 1,
            Err(e) => warn!(seed, error = %e, "Failed to create invoice"),
        }
    }

    let elapsed = start.elapsed();
    info!(
        generated,
        elapsed_ms = elapsed.as_millis() as u64,
        rate = %format!("{:.0}/s", generated as f64 / elapsed.as_secs_f64().max(f64::EPSILON)),
        "Invoices generated"
    );

    // Reports
    for owner in OWNERS {
        let scope = RevenueScope::owner(*owner);
        let series = billing.revenue(&scope, Granularity::Month).await?;
        let stats = billing.statistics(&scope).await?;

        let series_json = serde_json::to_string(&series)?;
        let stats_json = serde_json::to_string(&stats)?;
        info!(owner = %owner, series = %series_json, "Monthly revenue");
        info!(owner = %owner, stats = %stats_json, "Summary statistics");
    }

    let overall = billing.statistics(&RevenueScope::AllOwners).await?;
    info!(
        invoices = overall.invoice_count,
        revenue = %overall.total_revenue,
        tax = %overall.total_tax,
        average = %overall.average_invoice_value,
        "Seed complete"
    );

    if let Some(sample) = db.invoices().find_all().await?.first() {
        let rows = billing.tax_breakdown(sample.number()).await?;
        let rows_json = serde_json::to_string(&rows)?;
        info!(
            invoice_number = %sample.number(),
            breakdown = %rows_json,
            "Latest invoice tax breakdown"
        );
    }

    db.close().await;
    Ok(())
}
