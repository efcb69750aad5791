mod bootstrap;
mod output;

use anyhow::{Context, Result};
use retail_core::answers::conceptual_answers;
use retail_core::settings::Settings;
use retail_data::analysis::{analyze_file, AnalysisOptions};

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("Retail Analytics v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Report: {}, min purchases: {}, top N: {}",
        settings.report,
        settings.min_purchases,
        settings.top_n
    );

    let options = AnalysisOptions {
        min_purchases: settings.min_purchases,
        top_n: settings.top_n,
        report: settings.report_kind()?,
    };

    let mut report = analyze_file(&settings.input, &options)
        .with_context(|| format!("analysing {}", settings.input.display()))?;

    if settings.answers {
        report.conceptual_answers = Some(conceptual_answers());
    }

    output::write_report(&report, settings.output.as_deref())?;

    Ok(())
}
