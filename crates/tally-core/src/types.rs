//! # Domain Types
//!
//! Reference data the invoice engine reads but never changes.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Customer     │   │    TaxRate      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  bps (u32)      │       │
//! │  │  name           │   │  name           │   │  1800 = 18%     │       │
//! │  │  price_minor    │   │  gstin          │   │  1250 = 12.5%   │       │
//! │  │  tax_rate_bps   │   │  owner_id       │   └─────────────────┘       │
//! │  │  hsn_code       │   └─────────────────┘                              │
//! │  └────────┬────────┘                                                    │
//! │           │ snapshot()                                                  │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                    │
//! │  │ ProductSnapshot │  frozen into every LineItem                        │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{parse_scaled, Money};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so a percentage with two decimals
/// (12.50%) is an exact integer (1250). Equality is exact, which is what the
/// tax breakdown groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Largest rate the calculator accepts: 10 000 %.
    ///
    /// Far above any real tax; it keeps rate × amount inside the checked
    /// arithmetic range and rejects garbage values from storage.
    pub const MAX_BPS: u32 = 1_000_000;

    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a stored, signed basis-point value.
    ///
    /// Fails with [`CoreError::InvalidRate`] for negative values and for
    /// values above [`TaxRate::MAX_BPS`].
    pub fn try_from_bps(bps: i64) -> CoreResult<Self> {
        u32::try_from(bps)
            .ok()
            .filter(|bps| *bps <= Self::MAX_BPS)
            .map(TaxRate)
            .ok_or(CoreError::InvalidRate { bps })
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

/// Renders as a percentage with two decimals: `18.00`, `12.50`.
impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Parses a percentage such as `"18"`, `"12.5"` or `"0.25"`.
impl FromStr for TaxRate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_scaled(s.trim(), 2)
            .and_then(|bps| u32::try_from(bps).ok())
            .filter(|bps| *bps <= TaxRate::MAX_BPS)
            .map(TaxRate)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "tax_rate".to_string(),
                reason: format!("'{}' is not a percentage with at most 2 decimals", s),
            })
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product that can be invoiced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// User who registered the product.
    pub owner_id: String,

    /// Display name, copied onto invoice lines.
    pub name: String,

    pub description: Option<String>,

    /// HSN / classification code printed on tax documents.
    pub hsn_code: Option<String>,

    /// Unit price in minor units.
    pub price_minor: i64,

    /// Tax rate in basis points (1800 = 18%).
    ///
    /// Signed because it comes straight from storage; an out-of-range value is
    /// reported as `InvalidRate` when the product is invoiced.
    pub tax_rate_bps: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_minor(self.price_minor)
    }

    /// Returns the tax rate, rejecting out-of-range stored values.
    pub fn tax_rate(&self) -> CoreResult<TaxRate> {
        TaxRate::try_from_bps(self.tax_rate_bps)
    }

    /// Freezes the fields an invoice line copies.
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.id.clone(),
            product_name: self.name.clone(),
            unit_price: self.price(),
            tax_rate_bps: self.tax_rate_bps,
        }
    }
}

/// Product data as it was when a line was computed.
///
/// Later edits to the product never reach an existing invoice line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Money,
    pub tax_rate_bps: i64,
}

// =============================================================================
// Customer
// =============================================================================

/// A billed customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// 15-character GST identification number.
    pub gstin: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(tax_rate_bps: i64) -> Product {
        Product {
            id: "p-1".to_string(),
            owner_id: "owner-1".to_string(),
            name: "Widget".to_string(),
            description: None,
            hsn_code: Some("8471".to_string()),
            price_minor: 20000,
            tax_rate_bps,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(1800);
        assert_eq!(rate.bps(), 1800);
        assert_eq!(rate.to_string(), "18.00");
        assert_eq!(TaxRate::from_bps(1250).to_string(), "12.50");
    }

    #[test]
    fn test_tax_rate_try_from_negative() {
        let err = TaxRate::try_from_bps(-100).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRate { bps: -100 }));
        assert_eq!(TaxRate::try_from_bps(0).unwrap(), TaxRate::zero());
    }

    #[test]
    fn test_tax_rate_try_from_above_max() {
        let max = i64::from(TaxRate::MAX_BPS);
        assert_eq!(TaxRate::try_from_bps(max).unwrap().bps(), TaxRate::MAX_BPS);

        for bps in [max + 1, 4_000_000_000, i64::from(u32::MAX) + 1] {
            let err = TaxRate::try_from_bps(bps).unwrap_err();
            assert!(matches!(err, CoreError::InvalidRate { bps: b } if b == bps));
            assert!(err.to_string().contains("between 0 and 1000000"));
        }
    }

    #[test]
    fn test_tax_rate_parse() {
        assert_eq!("18".parse::<TaxRate>().unwrap().bps(), 1800);
        assert_eq!("12.5".parse::<TaxRate>().unwrap().bps(), 1250);
        assert_eq!("0.25".parse::<TaxRate>().unwrap().bps(), 25);
        assert!("-5".parse::<TaxRate>().is_err());
        assert!("5.125".parse::<TaxRate>().is_err());
        assert!("abc".parse::<TaxRate>().is_err());
    }

    #[test]
    fn test_tax_rate_ordering() {
        let mut rates = vec![TaxRate::from_bps(2800), TaxRate::zero(), TaxRate::from_bps(500)];
        rates.sort();
        assert_eq!(rates, vec![TaxRate::zero(), TaxRate::from_bps(500), TaxRate::from_bps(2800)]);
    }

    #[test]
    fn test_product_snapshot() {
        let snapshot = product(1800).snapshot();
        assert_eq!(snapshot.product_id, "p-1");
        assert_eq!(snapshot.product_name, "Widget");
        assert_eq!(snapshot.unit_price, Money::from_minor(20000));
        assert_eq!(snapshot.tax_rate_bps, 1800);
    }

    #[test]
    fn test_product_negative_rate_is_invalid() {
        assert!(product(1800).tax_rate().is_ok());
        assert!(matches!(product(-1).tax_rate(), Err(CoreError::InvalidRate { .. })));
    }
}
