use clap::{CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::ReportKind;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Descriptive aggregates over a retail transaction log
#[derive(Parser, Debug, Clone)]
#[command(
    name = "retail-analytics",
    about = "Descriptive aggregates over a retail transaction log",
    version
)]
pub struct Settings {
    /// Transaction file (.xlsx or .csv)
    pub input: PathBuf,

    /// Minimum number of purchase rows for a loyal customer
    #[arg(long, default_value = "5", allow_negative_numbers = true)]
    pub min_purchases: i64,

    /// Number of products in the demand ranking
    #[arg(long, default_value = "10")]
    pub top_n: usize,

    /// Aggregates to compute
    #[arg(long, default_value = "all", value_parser = ["all", "loyalty", "quarterly", "demand", "patterns"])]
    pub report: String,

    /// Include the conceptual answer table in the report
    #[arg(long)]
    pub answers: bool,

    /// Write the JSON report to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.retail-analytics/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_purchases: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

impl LastUsedParams {
    /// Default location: `~/.retail-analytics/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".retail-analytics").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args);
        let mut settings = Settings::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!("Failed to clear {}: {}", config_path.display(), e);
            }
            return Self::apply_debug_flag(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins over persisted values.
        // NOTE: clap stores the arg id using the *field name* (underscores).
        if !is_arg_explicitly_set(&matches, "min_purchases") {
            if let Some(v) = last.min_purchases {
                settings.min_purchases = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "top_n") {
            if let Some(v) = last.top_n {
                settings.top_n = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "report") {
            if let Some(v) = last.report.filter(|r| r.parse::<ReportKind>().is_ok()) {
                settings.report = v;
            }
        }

        settings = Self::apply_debug_flag(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::debug!("Could not persist settings to {}: {}", config_path.display(), e);
        }

        settings
    }

    /// The parsed `--report` selection.
    pub fn report_kind(&self) -> crate::Result<ReportKind> {
        self.report.parse()
    }

    fn apply_debug_flag(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            min_purchases: Some(s.min_purchases),
            top_n: Some(s.top_n),
            report: Some(s.report.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
