//! # Revenue Aggregation
//!
//! Dashboard figures computed from stored invoices: revenue per day or per
//! month, summary statistics, and in-memory invoice filtering.
//!
//! ## Bucketing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Granularity::Day                  key = date        label 2024-03-01  │
//! │  Granularity::Month + MonthOfYear  key = month 1-12  label MARCH       │
//! │  Granularity::Month + YearMonth    key = (y, m)      label 2024-03     │
//! │                                                                         │
//! │  MonthOfYear merges March 2023 and March 2024 into one bucket.         │
//! │  It is the default because existing dashboards expect it;              │
//! │  YearMonth keeps years apart.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Output is ordered by bucket key, never by label, so `FEBRUARY` comes
//! before `MARCH`.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::invoice::Invoice;
use crate::money::Money;

const MONTH_NAMES: [&str; 12] = [
    "JANUARY",
    "FEBRUARY",
    "MARCH",
    "APRIL",
    "MAY",
    "JUNE",
    "JULY",
    "AUGUST",
    "SEPTEMBER",
    "OCTOBER",
    "NOVEMBER",
    "DECEMBER",
];

// =============================================================================
// Aggregation Options
// =============================================================================

/// Bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Month,
}

impl FromStr for Granularity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "month" | "monthly" => Ok(Granularity::Month),
            _ => Err(ValidationError::InvalidFormat {
                field: "granularity".to_string(),
                reason: format!("'{}' is not one of: day, month", s),
            }),
        }
    }
}

/// How month buckets treat the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthBucketing {
    /// Group by calendar month only, across years.
    #[default]
    MonthOfYear,
    /// Group by year and month.
    YearMonth,
}

impl fmt::Display for MonthBucketing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthBucketing::MonthOfYear => write!(f, "month_of_year"),
            MonthBucketing::YearMonth => write!(f, "year_month"),
        }
    }
}

impl FromStr for MonthBucketing {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "month_of_year" => Ok(MonthBucketing::MonthOfYear),
            "year_month" => Ok(MonthBucketing::YearMonth),
            _ => Err(ValidationError::InvalidFormat {
                field: "month_bucketing".to_string(),
                reason: format!("'{}' is not one of: month_of_year, year_month", s),
            }),
        }
    }
}

/// Whose invoices count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevenueScope {
    Owner(String),
    AllOwners,
}

impl RevenueScope {
    pub fn owner(id: impl Into<String>) -> Self {
        RevenueScope::Owner(id.into())
    }

    pub fn includes(&self, invoice: &Invoice) -> bool {
        match self {
            RevenueScope::Owner(id) => invoice.owner_id() == id,
            RevenueScope::AllOwners => true,
        }
    }
}

// =============================================================================
// Revenue Series
// =============================================================================

/// One bucket of the revenue series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct RevenuePoint {
    pub label: String,
    pub total: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BucketKey {
    Day(NaiveDate),
    MonthOfYear(u32),
    YearMonth(i32, u32),
}

impl BucketKey {
    fn of(date: NaiveDate, granularity: Granularity, bucketing: MonthBucketing) -> Self {
        match (granularity, bucketing) {
            (Granularity::Day, _) => BucketKey::Day(date),
            (Granularity::Month, MonthBucketing::MonthOfYear) => BucketKey::MonthOfYear(date.month()),
            (Granularity::Month, MonthBucketing::YearMonth) => {
                BucketKey::YearMonth(date.year(), date.month())
            }
        }
    }

    fn label(&self) -> String {
        match self {
            BucketKey::Day(date) => date.format("%Y-%m-%d").to_string(),
            BucketKey::MonthOfYear(month) => MONTH_NAMES[(*month as usize) - 1].to_string(),
            BucketKey::YearMonth(year, month) => format!("{:04}-{:02}", year, month),
        }
    }
}

/// Sums grand totals per bucket, ascending by bucket key.
///
/// ## Example
/// ```rust,ignore
/// let series = aggregate_by_period(
///     &invoices,
///     Granularity::Month,
///     &RevenueScope::owner("u-1"),
///     MonthBucketing::default(),
/// );
/// // [RevenuePoint { label: "JANUARY", .. }, RevenuePoint { label: "FEBRUARY", .. }]
/// ```
pub fn aggregate_by_period<'a, I>(
    invoices: I,
    granularity: Granularity,
    scope: &RevenueScope,
    bucketing: MonthBucketing,
) -> Vec<RevenuePoint>
where
    I: IntoIterator<Item = &'a Invoice>,
{
    let buckets = invoices
        .into_iter()
        .filter(|inv| scope.includes(inv))
        .fold(BTreeMap::<BucketKey, Money>::new(), |mut acc, inv| {
            let key = BucketKey::of(inv.invoice_date(), granularity, bucketing);
            *acc.entry(key).or_default() += inv.grand_total();
            acc
        });

    buckets
        .into_iter()
        .map(|(key, total)| RevenuePoint {
            label: key.label(),
            total,
        })
        .collect()
}

// =============================================================================
// Summary Statistics
// =============================================================================

/// Headline dashboard numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[ts(export)]
pub struct InvoiceStatistics {
    pub invoice_count: u64,
    pub total_revenue: Money,
    pub total_tax: Money,
    /// Revenue / count, half-up; zero when there are no invoices.
    pub average_invoice_value: Money,
    pub unique_customers: u64,
}

pub fn summary_statistics<'a, I>(invoices: I, scope: &RevenueScope) -> InvoiceStatistics
where
    I: IntoIterator<Item = &'a Invoice>,
{
    let mut stats = InvoiceStatistics::default();
    let mut customers = BTreeSet::new();

    for inv in invoices.into_iter().filter(|inv| scope.includes(inv)) {
        stats.invoice_count += 1;
        stats.total_revenue += inv.grand_total();
        stats.total_tax += inv.total_tax();
        customers.insert(inv.customer_id());
    }

    stats.unique_customers = customers.len() as u64;
    stats.average_invoice_value = stats.total_revenue.divide_by(stats.invoice_count);
    stats
}

// =============================================================================
// Invoice Filter
// =============================================================================

/// Criteria search over an in-memory invoice list. Unset criteria match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub customer_id: Option<String>,
    pub min_total: Option<Money>,
    pub max_total: Option<Money>,
    pub number_contains: Option<String>,
}

impl InvoiceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive date range.
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn min_total(mut self, min: Money) -> Self {
        self.min_total = Some(min);
        self
    }

    pub fn max_total(mut self, max: Money) -> Self {
        self.max_total = Some(max);
        self
    }

    pub fn number_contains(mut self, fragment: impl Into<String>) -> Self {
        self.number_contains = Some(fragment.into());
        self
    }

    pub fn matches(&self, invoice: &Invoice) -> bool {
        let date = invoice.invoice_date();
        let total = invoice.grand_total();

        self.from.map_or(true, |from| date >= from)
            && self.to.map_or(true, |to| date <= to)
            && self
                .customer_id
                .as_deref()
                .map_or(true, |c| invoice.customer_id() == c)
            && self.min_total.map_or(true, |min| total >= min)
            && self.max_total.map_or(true, |max| total <= max)
            && self.number_contains.as_deref().map_or(true, |fragment| {
                invoice
                    .number()
                    .to_lowercase()
                    .contains(&fragment.to_lowercase())
            })
    }

    pub fn apply<'a>(&self, invoices: &'a [Invoice]) -> Vec<&'a Invoice> {
        invoices.iter().filter(|inv| self.matches(inv)).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
