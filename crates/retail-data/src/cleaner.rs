//! Row-level filtering ahead of aggregation.

use retail_core::models::{TransactionRow, TransactionTable};
use tracing::{debug, warn};

/// Whether `row` survives cleaning: a customer is present and both quantity
/// and unit price are present and strictly positive.
pub fn is_valid_purchase(row: &TransactionRow) -> bool {
    row.customer_id.is_some()
        && row.quantity.is_some_and(|q| q > 0)
        && row.unit_price.is_some_and(|p| p > 0.0)
}

/// Return a new table holding only valid purchases, in input order.
pub fn clean_transactions(table: &TransactionTable) -> TransactionTable {
    let cleaned: TransactionTable = table
        .iter()
        .filter(|row| is_valid_purchase(row))
        .cloned()
        .collect();

    let dropped = table.len() - cleaned.len();
    debug!(
        "Cleaning kept {} of {} rows ({} dropped)",
        cleaned.len(),
        table.len(),
        dropped
    );
    if cleaned.is_empty() && !table.is_empty() {
        warn!("Every row was dropped during cleaning");
    }

    cleaned
}
