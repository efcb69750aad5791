//! Group-and-reduce passes over a cleaned transaction table.
//!
//! Every function is pure: it reads the table once and returns a fresh result.

use std::collections::{BTreeMap, HashMap};

use retail_core::error::{Result, RetailError};
use retail_core::models::{
    CustomerPurchases, ProductDemand, PurchasePattern, QuarterRevenue, TransactionRow,
    TransactionTable,
};
use retail_core::time_utils::{parse_invoice_timestamp, Quarter};

// ── ProductStats ──────────────────────────────────────────────────────────────

/// Running sums for one product.
///
/// Each column keeps its own count so a missing value only drops out of its
/// own mean.
#[derive(Debug, Clone, Default)]
pub struct ProductStats {
    pub quantity_sum: i128,
    pub quantity_count: u64,
    pub unit_price_sum: f64,
    pub unit_price_count: u64,
}

impl ProductStats {
    /// Add a single row's values to the running totals.
    pub fn add_row(&mut self, row: &TransactionRow) {
        if let Some(quantity) = row.quantity {
            self.quantity_sum += i128::from(quantity);
            self.quantity_count += 1;
        }
        if let Some(unit_price) = row.unit_price {
            self.unit_price_sum += unit_price;
            self.unit_price_count += 1;
        }
    }

    pub fn mean_quantity(&self) -> f64 {
        if self.quantity_count == 0 {
            return 0.0;
        }
        self.quantity_sum as f64 / self.quantity_count as f64
    }

    pub fn mean_unit_price(&self) -> f64 {
        if self.unit_price_count == 0 {
            return 0.0;
        }
        self.unit_price_sum / self.unit_price_count as f64
    }
}

// ── TransactionAggregator ─────────────────────────────────────────────────────

/// Stateless helper that groups transaction rows by customer, quarter or
/// product.
pub struct TransactionAggregator;

impl TransactionAggregator {
    /// Customers with at least `min_purchases` rows, by ascending customer id.
    ///
    /// The threshold is inclusive; a negative threshold keeps every customer.
    /// Rows without a customer are skipped.
    pub fn loyal_customers(table: &TransactionTable, min_purchases: i64) -> Vec<CustomerPurchases> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for customer in table.iter().filter_map(|r| r.customer_id.as_deref()) {
            *counts.entry(customer).or_default() += 1;
        }

        counts
            .into_iter()
            .filter(|(_, count)| *count as i64 >= min_purchases)
            .map(|(customer_id, purchase_count)| CustomerPurchases {
                customer_id: customer_id.to_string(),
                purchase_count,
            })
            .collect()
    }

    /// Revenue per calendar quarter, in chronological order.
    ///
    /// Quarters without rows are absent. The first unparseable timestamp
    /// fails the whole computation. Rows missing a quantity or price add
    /// nothing to their quarter.
    pub fn quarterly_revenue(table: &TransactionTable) -> Result<Vec<QuarterRevenue>> {
        let mut map: BTreeMap<Quarter, f64> = BTreeMap::new();

        for row in table {
            let ts = parse_invoice_timestamp(&row.invoice_date)?;
            *map.entry(Quarter::from_date(ts)).or_default() += row.revenue().unwrap_or(0.0);
        }

        Ok(map
            .into_iter()
            .map(|(quarter, total_revenue)| QuarterRevenue {
                quarter,
                total_revenue,
            })
            .collect())
    }

    /// The `top_n` products by total quantity, highest first.
    ///
    /// Equal totals keep the order in which their products first appear.
    /// Returns [`RetailError::QuantityOverflow`] when a product's total does
    /// not fit in an `i64`.
    pub fn high_demand_products(
        table: &TransactionTable,
        top_n: usize,
    ) -> Result<Vec<ProductDemand>> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut totals: Vec<ProductDemand> = Vec::new();

        for row in table {
            let slot = *index.entry(row.stock_code.as_str()).or_insert_with(|| {
                totals.push(ProductDemand {
                    stock_code: row.stock_code.clone(),
                    total_quantity: 0,
                });
                totals.len() - 1
            });
            if let Some(quantity) = row.quantity {
                let entry = &mut totals[slot];
                entry.total_quantity = entry
                    .total_quantity
                    .checked_add(quantity)
                    .ok_or_else(|| RetailError::QuantityOverflow(row.stock_code.clone()))?;
            }
        }

        // sort_by is stable, so first-seen order survives among ties.
        totals.sort_by(|a, b| b.total_quantity.cmp(&a.total_quantity));
        totals.truncate(top_n);
        Ok(totals)
    }

    /// Mean quantity and mean unit price per product, by ascending stock code.
    pub fn purchase_patterns(table: &TransactionTable) -> Vec<PurchasePattern> {
        Self::product_stats(table)
            .into_iter()
            .map(|(stock_code, stats)| PurchasePattern {
                stock_code: stock_code.to_string(),
                avg_quantity: stats.mean_quantity(),
                avg_unit_price: stats.mean_unit_price(),
            })
            .collect()
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn product_stats(table: &TransactionTable) -> BTreeMap<&str, ProductStats> {
        let mut map: BTreeMap<&str, ProductStats> = BTreeMap::new();
        for row in table {
            map.entry(row.stock_code.as_str()).or_default().add_row(row);
        }
        map
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_row(customer: &str, code: &str, qty: i64, price: f64, date: &str) -> TransactionRow {
        TransactionRow {
            customer_id: Some(customer.to_string()),
            stock_code: code.to_string(),
            quantity: Some(qty),
            unit_price: Some(price),
            invoice_date: date.to_string(),
        }
    }

    /// The three-row worked example.
    fn example_table() -> TransactionTable {
        TransactionTable::new(vec![
            make_row("C1", "P1", 2, 5.0, "2023-01-10"),
            make_row("C1", "P1", 1, 5.0, "2023-04-02"),
            make_row("C2", "P2", 3, 2.0, "2023-01-15"),
        ])
    }

    fn larger_table() -> TransactionTable {
        TransactionTable::new(vec![
            make_row("17850", "85123A", 6, 2.55, "12/1/2010 8:26"),
            make_row("17850", "71053", 6, 3.39, "12/1/2010 8:26"),
            make_row("13047", "84406B", 8, 2.75, "12/1/2010 8:34"),
            make_row("12583", "22728", 24, 3.75, "2011-02-03 10:00:00"),
            make_row("17850", "85123A", 12, 2.55, "2011-05-12T09:00:00"),
            make_row("13047", "22728", 4, 3.75, "2011-08-30 14:10"),
            make_row("12583", "71053", 2, 3.39, "2011-11-01 11:11:11"),
        ])
    }

    // ── loyal_customers ───────────────────────────────────────────────────────

    #[test]
    fn test_loyal_customers_example() {
        let loyal = TransactionAggregator::loyal_customers(&example_table(), 2);
        assert_eq!(
            loyal,
            vec![CustomerPurchases {
                customer_id: "C1".to_string(),
                purchase_count: 2
            }]
        );
    }

    #[test]
    fn test_loyal_customers_threshold_is_inclusive() {
        let loyal = TransactionAggregator::loyal_customers(&larger_table(), 3);
        assert_eq!(loyal.len(), 1);
        assert_eq!(loyal[0].customer_id, "17850");
        assert_eq!(loyal[0].purchase_count, 3);

        assert!(TransactionAggregator::loyal_customers(&larger_table(), 4).is_empty());
    }

    #[test]
    fn test_loyal_customers_zero_threshold_returns_every_customer() {
        let table = larger_table();
        let loyal = TransactionAggregator::loyal_customers(&table, 0);

        let ids: Vec<&str> = loyal.iter().map(|c| c.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["12583", "13047", "17850"]);
        assert!(loyal.iter().all(|c| c.purchase_count >= 1));
        assert_eq!(
            loyal.iter().map(|c| c.purchase_count).sum::<usize>(),
            table.len()
        );
    }

    #[test]
    fn test_loyal_customers_negative_threshold_returns_every_customer() {
        let loyal = TransactionAggregator::loyal_customers(&example_table(), -3);
        assert_eq!(loyal.len(), 2);
    }

    #[test]
    fn test_loyal_customers_empty_table() {
        assert!(TransactionAggregator::loyal_customers(&TransactionTable::default(), 0).is_empty());
    }

    // ── quarterly_revenue ─────────────────────────────────────────────────────

    #[test]
    fn test_quarterly_revenue_example() {
        let revenue = TransactionAggregator::quarterly_revenue(&example_table()).unwrap();
        assert_eq!(revenue.len(), 2);
        assert_eq!(revenue[0].quarter.to_string(), "2023Q1");
        assert!((revenue[0].total_revenue - 16.0).abs() < 1e-9);
        assert_eq!(revenue[1].quarter.to_string(), "2023Q2");
        assert!((revenue[1].total_revenue - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_quarterly_revenue_chronological_without_zero_fill() {
        let revenue = TransactionAggregator::quarterly_revenue(&larger_table()).unwrap();
        let labels: Vec<String> = revenue.iter().map(|q| q.quarter.to_string()).collect();
        assert_eq!(labels, vec!["2010Q4", "2011Q1", "2011Q2", "2011Q3", "2011Q4"]);
    }

    #[test]
    fn test_quarterly_revenue_sums_to_table_total() {
        let table = larger_table();
        let revenue = TransactionAggregator::quarterly_revenue(&table).unwrap();
        let total: f64 = revenue.iter().map(|q| q.total_revenue).sum();
        assert!((total - table.total_revenue()).abs() < 1e-6);
    }

    #[test]
    fn test_quarterly_revenue_bad_timestamp_is_fatal() {
        let mut rows = example_table().rows().to_vec();
        rows.push(make_row("C3", "P3", 1, 1.0, "sometime in spring"));
        let err = TransactionAggregator::quarterly_revenue(&TransactionTable::new(rows)).unwrap_err();
        assert!(matches!(err, RetailError::TimestampParse(_)));
    }

    #[test]
    fn test_quarterly_revenue_empty_table() {
        let revenue = TransactionAggregator::quarterly_revenue(&TransactionTable::default()).unwrap();
        assert!(revenue.is_empty());
    }

    // ── high_demand_products ──────────────────────────────────────────────────

    #[test]
    fn test_high_demand_tie_keeps_first_seen() {
        let top = TransactionAggregator::high_demand_products(&example_table(), 1).unwrap();
        assert_eq!(
            top,
            vec![ProductDemand {
                stock_code: "P1".to_string(),
                total_quantity: 3
            }]
        );
    }

    #[test]
    fn test_high_demand_sorted_descending() {
        let top = TransactionAggregator::high_demand_products(&larger_table(), 3).unwrap();
        let codes: Vec<(&str, i64)> = top
            .iter()
            .map(|p| (p.stock_code.as_str(), p.total_quantity))
            .collect();
        assert_eq!(codes, vec![("22728", 28), ("85123A", 18), ("71053", 8)]);
    }

    #[test]
    fn test_high_demand_top_n_larger_than_products() {
        let table = larger_table();
        let all = TransactionAggregator::high_demand_products(&table, 100).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(
            all.iter().map(|p| i128::from(p.total_quantity)).sum::<i128>(),
            table.total_quantity()
        );
    }

    #[test]
    fn test_high_demand_top_zero() {
        assert!(TransactionAggregator::high_demand_products(&larger_table(), 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_high_demand_overflow_is_an_error() {
        let table = TransactionTable::new(vec![
            make_row("C1", "P1", i64::MAX, 1.0, "2023-01-10"),
            make_row("C2", "P1", 1, 1.0, "2023-01-11"),
        ]);
        let err = TransactionAggregator::high_demand_products(&table, 1).unwrap_err();
        assert!(matches!(err, RetailError::QuantityOverflow(ref code) if code == "P1"));
    }

    #[test]
    fn test_high_demand_large_totals_across_products() {
        let table = TransactionTable::new(vec![
            make_row("C1", "P1", i64::MAX, 1.0, "2023-01-10"),
            make_row("C2", "P2", i64::MAX, 1.0, "2023-01-11"),
            make_row("C3", "P1", -1, 1.0, "2023-01-12"),
        ]);
        let top = TransactionAggregator::high_demand_products(&table, 2).unwrap();
        assert_eq!(top[0].stock_code, "P2");
        assert_eq!(top[1].total_quantity, i64::MAX - 1);
    }

    // ── purchase_patterns ─────────────────────────────────────────────────────

    #[test]
    fn test_purchase_patterns_example() {
        let patterns = TransactionAggregator::purchase_patterns(&example_table());
        assert_eq!(
            patterns,
            vec![
                PurchasePattern {
                    stock_code: "P1".to_string(),
                    avg_quantity: 1.5,
                    avg_unit_price: 5.0
                },
                PurchasePattern {
                    stock_code: "P2".to_string(),
                    avg_quantity: 3.0,
                    avg_unit_price: 2.0
                },
            ]
        );
    }

    #[test]
    fn test_purchase_patterns_one_row_per_product() {
        let patterns = TransactionAggregator::purchase_patterns(&larger_table());
        let codes: Vec<&str> = patterns.iter().map(|p| p.stock_code.as_str()).collect();
        assert_eq!(codes, vec!["22728", "71053", "84406B", "85123A"]);

        let p84406b = &patterns[2];
        assert_eq!(p84406b.avg_quantity, 8.0);
        assert_eq!(p84406b.avg_unit_price, 2.75);
    }

    #[test]
    fn test_purchase_patterns_large_quantities_do_not_overflow() {
        let table = TransactionTable::new(vec![
            make_row("C1", "P1", i64::MAX, 1.0, "2023-01-10"),
            make_row("C2", "P1", i64::MAX, 3.0, "2023-01-11"),
        ]);
        let patterns = TransactionAggregator::purchase_patterns(&table);
        assert_eq!(patterns[0].avg_quantity, i64::MAX as f64);
        assert_eq!(patterns[0].avg_unit_price, 2.0);
    }

    #[test]
    fn test_missing_values_drop_out_of_their_own_mean() {
        let mut no_price = make_row("C2", "P1", 4, 0.0, "2023-01-11");
        no_price.unit_price = None;
        let table =
            TransactionTable::new(vec![make_row("C1", "P1", 2, 5.0, "2023-01-10"), no_price]);

        let patterns = TransactionAggregator::purchase_patterns(&table);
        assert_eq!(patterns[0].avg_quantity, 3.0);
        assert_eq!(patterns[0].avg_unit_price, 5.0);

        let revenue = TransactionAggregator::quarterly_revenue(&table).unwrap();
        assert!((revenue[0].total_revenue - 10.0).abs() < 1e-9);
    }

    // ── idempotence ───────────────────────────────────────────────────────────

    #[test]
    fn test_aggregators_are_repeatable() {
        let table = larger_table();
        assert_eq!(
            TransactionAggregator::loyal_customers(&table, 1),
            TransactionAggregator::loyal_customers(&table, 1)
        );
        assert_eq!(
            TransactionAggregator::quarterly_revenue(&table).unwrap(),
            TransactionAggregator::quarterly_revenue(&table).unwrap()
        );
        assert_eq!(
            TransactionAggregator::high_demand_products(&table, 2).unwrap(),
            TransactionAggregator::high_demand_products(&table, 2).unwrap()
        );
        assert_eq!(
            TransactionAggregator::purchase_patterns(&table),
            TransactionAggregator::purchase_patterns(&table)
        );
    }

    // ── ProductStats ──────────────────────────────────────────────────────────

    #[test]
    fn test_product_stats_empty_means_are_zero() {
        let stats = ProductStats::default();
        assert_eq!(stats.mean_quantity(), 0.0);
        assert_eq!(stats.mean_unit_price(), 0.0);
    }
}
