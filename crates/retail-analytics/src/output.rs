use std::io::Write;
use std::path::Path;

use anyhow::Context;
use retail_data::analysis::AnalysisReport;

/// Write `report` as pretty JSON to `output`, or to stdout when `None`.
///
/// File output goes through a sibling temp file and a rename, so a failed
/// run never leaves a half-written report behind.
pub fn write_report(report: &AnalysisReport, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialising report")?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, &json).with_context(|| format!("writing {}", tmp.display()))?;
            std::fs::rename(&tmp, path)
                .with_context(|| format!("moving report into {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", json)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use retail_core::models::{ReportKind, TransactionRow, TransactionTable};
    use retail_data::analysis::{analyze_table, AnalysisOptions};
    use tempfile::TempDir;

    fn sample_report() -> AnalysisReport {
        let table = TransactionTable::new(vec![TransactionRow {
            customer_id: Some("C1".to_string()),
            stock_code: "P1".to_string(),
            quantity: Some(2),
            unit_price: Some(5.0),
            invoice_date: "2023-01-10".to_string(),
        }]);
        let options = AnalysisOptions {
            report: ReportKind::Demand,
            ..Default::default()
        };
        analyze_table(&table, &options).unwrap()
    }

    #[test]
    fn test_write_report_to_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reports").join("retail.json");

        write_report(&sample_report(), Some(&path)).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["high_demand_products"][0]["stock_code"], "P1");
        assert_eq!(written["high_demand_products"][0]["total_quantity"], 2);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_write_report_overwrites_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("retail.json");
        std::fs::write(&path, "stale").unwrap();

        write_report(&sample_report(), Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with('{'));
    }
}
