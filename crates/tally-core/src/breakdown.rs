//! # Tax Breakdown
//!
//! Groups an invoice's lines by tax rate for the tax summary printed on the
//! invoice. Each rate's tax is shown as two equal shares (central and state
//! GST).
//!
//! ```text
//! ┌───────────┬──────────────┬────────────┬───────────────┬─────────────┐
//! │ Rate      │ Taxable      │ Tax        │ Central share │ State share │
//! ├───────────┼──────────────┼────────────┼───────────────┼─────────────┤
//! │  5.00     │     200.00   │    10.00   │      5.00     │     5.00    │
//! │ 18.00     │     500.00   │    90.00   │     45.00     │    45.00    │
//! └───────────┴──────────────┴────────────┴───────────────┴─────────────┘
//! ```
//!
//! Each share is rounded half-up on its own, so for an odd tax amount the two
//! shares together are one unit more than the tax.

use serde::Serialize;
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::invoice::Invoice;
use crate::money::Money;
use crate::types::TaxRate;

/// Accumulated amounts for one tax rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaxBreakdown {
    pub taxable_amount: Money,
    pub tax_amount: Money,
}

impl TaxBreakdown {
    pub fn central_share(&self) -> Money {
        self.tax_amount.half()
    }

    pub fn state_share(&self) -> Money {
        self.tax_amount.half()
    }
}

/// One row of the rendered breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct TaxBreakdownRow {
    pub rate: TaxRate,
    pub taxable_amount: Money,
    pub tax_amount: Money,
    pub central_share: Money,
    pub state_share: Money,
}

/// Folds the invoice lines into per-rate totals.
pub fn breakdown(invoice: &Invoice) -> BTreeMap<TaxRate, TaxBreakdown> {
    invoice
        .lines()
        .iter()
        .fold(BTreeMap::new(), |mut acc, line| {
            let entry: &mut TaxBreakdown = acc.entry(line.tax_rate()).or_default();
            entry.taxable_amount += line.taxable_amount();
            entry.tax_amount += line.tax_amount();
            acc
        })
}

/// The breakdown as rows, ascending by rate.
pub fn breakdown_rows(invoice: &Invoice) -> Vec<TaxBreakdownRow> {
    breakdown(invoice)
        .into_iter()
        .map(|(rate, b)| TaxBreakdownRow {
            rate,
            taxable_amount: b.taxable_amount,
            tax_amount: b.tax_amount,
            central_share: b.central_share(),
            state_share: b.state_share(),
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::SequentialIdentifierGenerator;
    use crate::invoice::create_invoice;
    use crate::line_item::LineRequest;
    use crate::types::Product;
    use chrono::Utc;
    use proptest::prelude::*;

    fn product(id: &str, price_minor: i64, tax_rate_bps: i64) -> Product {
        Product {
            id: id.to_string(),
            owner_id: "u-1".to_string(),
            name: id.to_string(),
            description: None,
            hsn_code: None,
            price_minor,
            tax_rate_bps,
            created_at: Utc::now(),
        }
    }

    fn invoice(products: &[Product], requests: &[LineRequest]) -> Invoice {
        let ids = SequentialIdentifierGenerator::new("INV");
        create_invoice("c-1", "u-1", requests, products, &ids, Utc::now()).unwrap()
    }

    #[test]
    fn test_two_lines_same_rate_single_row() {
        let products = [product("a", 20000, 1800), product("b", 10000, 1800)];
        let inv = invoice(&products, &[LineRequest::new("a", 2), LineRequest::new("b", 1)]);

        let rows = breakdown_rows(&inv);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rate, TaxRate::from_bps(1800));
        assert_eq!(rows[0].taxable_amount, Money::from_minor(50000));
        assert_eq!(rows[0].tax_amount, Money::from_minor(9000));
        assert_eq!(rows[0].central_share, Money::from_minor(4500));
        assert_eq!(rows[0].state_share, Money::from_minor(4500));
    }

    #[test]
    fn test_invoice_without_lines_has_empty_breakdown() {
        let header = crate::invoice::InvoiceHeader {
            number: "LEGACY-1".to_string(),
            invoice_date: chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            created_at: Utc::now(),
            owner_id: "u-1".to_string(),
            customer_id: "c-1".to_string(),
        };
        let inv = Invoice::restore(header, Vec::new()).unwrap();

        assert!(breakdown(&inv).is_empty());
        assert!(breakdown_rows(&inv).is_empty());
    }

    #[test]
    fn test_rows_sorted_by_rate() {
        let products = [
            product("hi", 1000, 2800),
            product("zero", 1000, 0),
            product("lo", 1000, 500),
        ];
        let inv = invoice(
            &products,
            &[
                LineRequest::new("hi", 1),
                LineRequest::new("zero", 1),
                LineRequest::new("lo", 1),
            ],
        );

        let rates: Vec<u32> = breakdown_rows(&inv).iter().map(|r| r.rate.bps()).collect();
        assert_eq!(rates, vec![0, 500, 2800]);
    }

    #[test]
    fn test_odd_tax_shares_round_up() {
        // 0.10 at 5% = 0.005 → 0.01 tax, each share 0.005 → 0.01
        let products = [product("a", 10, 500)];
        let inv = invoice(&products, &[LineRequest::new("a", 1)]);

        let rows = breakdown_rows(&inv);
        assert_eq!(rows[0].tax_amount, Money::from_minor(1));
        assert_eq!(rows[0].central_share, Money::from_minor(1));
        assert_eq!(rows[0].state_share, Money::from_minor(1));
    }

    #[test]
    fn test_breakdown_is_idempotent() {
        let products = [product("a", 12345, 1200), product("b", 999, 500)];
        let inv = invoice(&products, &[LineRequest::new("a", 3), LineRequest::new("b", 7)]);

        assert_eq!(breakdown(&inv), breakdown(&inv));
        assert_eq!(breakdown_rows(&inv), breakdown_rows(&inv));
    }

    #[test]
    fn test_row_json_shape() {
        let products = [product("a", 20000, 1800)];
        let inv = invoice(&products, &[LineRequest::new("a", 2)]);

        let json = serde_json::to_value(&breakdown_rows(&inv)[0]).unwrap();
        assert_eq!(json["rate"], 1800);
        assert_eq!(json["central_share"], 3600);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// Property: the breakdown conserves the invoice totals.
        #[test]
        fn breakdown_conserves_totals(
            lines in prop::collection::vec((0i64..1_000_000, 1i64..100, prop::sample::select(vec![0i64, 500, 1200, 1800, 2800])), 1..15)
        ) {
            let products: Vec<Product> = lines
                .iter()
                .enumerate()
                .map(|(i, (price, _, bps))| product(&i.to_string(), *price, *bps))
                .collect();
            let requests: Vec<LineRequest> = lines
                .iter()
                .enumerate()
                .map(|(i, (_, qty, _))| LineRequest::new(i.to_string(), *qty))
                .collect();
            let inv = invoice(&products, &requests);

            let groups = breakdown(&inv);
            let taxable: Money = groups.values().map(|b| b.taxable_amount).sum();
            let tax: Money = groups.values().map(|b| b.tax_amount).sum();
            prop_assert_eq!(taxable, inv.subtotal());
            prop_assert_eq!(tax, inv.total_tax());

            for b in groups.values() {
                let shares = b.central_share() + b.state_share();
                prop_assert!((shares.minor() - b.tax_amount.minor()).abs() <= 1);
            }
        }
    }
}
