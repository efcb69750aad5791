use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RetailError;
use crate::time_utils::Quarter;

/// A single line item read from the transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    /// Customer identifier; `None` when the source cell was empty.
    pub customer_id: Option<String>,
    /// Product identifier.
    pub stock_code: String,
    /// Units sold on this line. Negative for returns; `None` when the
    /// source cell was empty.
    pub quantity: Option<i64>,
    /// Price per unit; `None` when the source cell was empty.
    pub unit_price: Option<f64>,
    /// Raw invoice timestamp text, parsed on demand.
    pub invoice_date: String,
}

impl TransactionRow {
    /// `quantity × unit_price`, or `None` when either value is missing.
    pub fn revenue(&self) -> Option<f64> {
        let quantity = self.quantity?;
        let unit_price = self.unit_price?;
        Some(quantity as f64 * unit_price)
    }
}

/// An ordered, immutable sequence of [`TransactionRow`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionTable {
    rows: Vec<TransactionRow>,
}

impl TransactionTable {
    pub fn new(rows: Vec<TransactionRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[TransactionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransactionRow> {
        self.rows.iter()
    }

    /// Sum of `quantity` over every row, skipping missing values.
    ///
    /// Accumulated as `i128`, which cannot overflow for any table that fits in memory.
    pub fn total_quantity(&self) -> i128 {
        self.rows
            .iter()
            .filter_map(|r| r.quantity)
            .map(i128::from)
            .sum()
    }

    /// Sum of `quantity × unit_price` over every row, skipping rows where
    /// either value is missing.
    pub fn total_revenue(&self) -> f64 {
        self.rows.iter().filter_map(TransactionRow::revenue).sum()
    }
}

impl FromIterator<TransactionRow> for TransactionTable {
    fn from_iter<I: IntoIterator<Item = TransactionRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TransactionTable {
    type Item = &'a TransactionRow;
    type IntoIter = std::slice::Iter<'a, TransactionRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

// ── Aggregate rows ────────────────────────────────────────────────────────────

/// Number of transaction rows attributed to one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerPurchases {
    pub customer_id: String,
    pub purchase_count: usize,
}

/// Summed revenue for one calendar quarter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterRevenue {
    pub quarter: Quarter,
    pub total_revenue: f64,
}

/// Total units sold for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDemand {
    pub stock_code: String,
    pub total_quantity: i64,
}

/// Mean quantity and mean unit price for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasePattern {
    pub stock_code: String,
    pub avg_quantity: f64,
    pub avg_unit_price: f64,
}

// ── ReportKind ────────────────────────────────────────────────────────────────

/// Which aggregates an analysis run should compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    All,
    Loyalty,
    Quarterly,
    Demand,
    Patterns,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::All => "all",
            ReportKind::Loyalty => "loyalty",
            ReportKind::Quarterly => "quarterly",
            ReportKind::Demand => "demand",
            ReportKind::Patterns => "patterns",
        }
    }

    /// Whether `other` is covered by this selection.
    pub fn includes(&self, other: ReportKind) -> bool {
        *self == ReportKind::All || *self == other
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = RetailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ReportKind::All),
            "loyalty" => Ok(ReportKind::Loyalty),
            "quarterly" => Ok(ReportKind::Quarterly),
            "demand" => Ok(ReportKind::Demand),
            "patterns" => Ok(ReportKind::Patterns),
            other => Err(RetailError::Config(format!("unknown report: {other}"))),
        }
    }
}
