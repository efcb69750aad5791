//! Main analysis pipeline.
//!
//! Loads a transaction file, cleans it once and runs the selected
//! aggregators, returning an [`AnalysisReport`] ready for serialisation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use retail_core::error::Result;
use retail_core::models::{
    CustomerPurchases, ProductDemand, PurchasePattern, QuarterRevenue, ReportKind,
    TransactionTable,
};
use serde::Serialize;
use tracing::info;

use crate::aggregator::TransactionAggregator;
use crate::cleaner::clean_transactions;
use crate::reader::load_transactions;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parameters for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Inclusive row-count threshold for loyal customers.
    pub min_purchases: i64,
    /// Length of the demand ranking.
    pub top_n: usize,
    /// Which aggregates to compute.
    pub report: ReportKind,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            min_purchases: 5,
            top_n: 10,
            report: ReportKind::All,
        }
    }
}

/// Metadata produced alongside the aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this report was generated.
    pub generated_at: String,
    /// Input file, when the table was loaded from disk.
    pub source: Option<String>,
    /// Rows read from the input.
    pub rows_loaded: usize,
    /// Rows that survived cleaning.
    pub rows_retained: usize,
    /// Rows removed by cleaning.
    pub rows_dropped: usize,
    /// Wall-clock seconds spent loading the input.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent cleaning and aggregating.
    pub aggregate_time_seconds: f64,
}

/// The complete output of [`analyze_file`] / [`analyze_table`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub metadata: AnalysisMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loyal_customers: Option<Vec<CustomerPurchases>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarterly_revenue: Option<Vec<QuarterRevenue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_demand_products: Option<Vec<ProductDemand>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_patterns: Option<Vec<PurchasePattern>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conceptual_answers: Option<BTreeMap<&'static str, BTreeSet<&'static str>>>,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full pipeline against a file on disk.
///
/// 1. Load the table via [`load_transactions`].
/// 2. Clean it once.
/// 3. Run every aggregator selected by `options.report`.
pub fn analyze_file(path: &Path, options: &AnalysisOptions) -> Result<AnalysisReport> {
    info!("Loading transactions from {}", path.display());

    let load_start = Instant::now();
    let table = load_transactions(path)?;
    let load_time = load_start.elapsed().as_secs_f64();

    let mut report = analyze_table(&table, options)?;
    report.metadata.source = Some(path.display().to_string());
    report.metadata.load_time_seconds = load_time;
    Ok(report)
}

/// Run cleaning and aggregation on an already loaded table.
pub fn analyze_table(table: &TransactionTable, options: &AnalysisOptions) -> Result<AnalysisReport> {
    let start = Instant::now();
    let cleaned = clean_transactions(table);
    let wants = |kind| options.report.includes(kind);

    let loyal_customers = wants(ReportKind::Loyalty)
        .then(|| TransactionAggregator::loyal_customers(&cleaned, options.min_purchases));

    let quarterly_revenue = if wants(ReportKind::Quarterly) {
        Some(TransactionAggregator::quarterly_revenue(&cleaned)?)
    } else {
        None
    };

    let high_demand_products = if wants(ReportKind::Demand) {
        Some(TransactionAggregator::high_demand_products(&cleaned, options.top_n)?)
    } else {
        None
    };

    let purchase_patterns =
        wants(ReportKind::Patterns).then(|| TransactionAggregator::purchase_patterns(&cleaned));

    let aggregate_time = start.elapsed().as_secs_f64();

    info!(
        "Analysed {} rows ({} retained) for report '{}'",
        table.len(),
        cleaned.len(),
        options.report
    );

    Ok(AnalysisReport {
        metadata: AnalysisMetadata {
            generated_at: Utc::now().to_rfc3339(),
            source: None,
            rows_loaded: table.len(),
            rows_retained: cleaned.len(),
            rows_dropped: table.len() - cleaned.len(),
            load_time_seconds: 0.0,
            aggregate_time_seconds: aggregate_time,
        },
        loyal_customers,
        quarterly_revenue,
        high_demand_products,
        purchase_patterns,
        conceptual_answers: None,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
