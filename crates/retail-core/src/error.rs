use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`RetailError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input file extension is not one of the supported formats.
    UnsupportedFormat,
    /// The input file is missing or unreadable.
    Io,
    /// The input was readable but its contents do not fit the schema.
    MalformedData,
    /// A configuration value is missing or invalid.
    Config,
    /// Anything else.
    Other,
}

/// All errors produced by the retail analytics crates.
#[derive(Error, Debug)]
pub enum RetailError {
    /// The file extension is neither `.xlsx` nor `.csv`.
    #[error("Unsupported file format: {0}. Use .xlsx or .csv")]
    UnsupportedFormat(PathBuf),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required column is absent from the header row.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A cell could not be converted to the type its column requires.
    #[error("Malformed value {value:?} in column {column} at row {row}")]
    MalformedValue {
        row: usize,
        column: String,
        value: String,
    },

    /// A timestamp string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// Summed quantities for one product do not fit in an `i64`.
    #[error("Total quantity for product {0} overflows")]
    QuantityOverflow(String),

    /// The delimited reader rejected the input.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The spreadsheet reader rejected the input.
    #[error("Failed to read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    /// The workbook has no worksheet, or its first sheet has no header row.
    #[error("Workbook has no data: {0}")]
    EmptyWorkbook(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RetailError {
    /// Map the error onto the coarse taxonomy callers branch on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetailError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            RetailError::FileRead { .. } | RetailError::Io(_) => ErrorKind::Io,
            RetailError::Csv(e) if e.is_io_error() => ErrorKind::Io,
            RetailError::MissingColumn(_)
            | RetailError::MalformedValue { .. }
            | RetailError::TimestampParse(_)
            | RetailError::QuantityOverflow(_)
            | RetailError::Csv(_)
            | RetailError::Workbook { .. }
            | RetailError::EmptyWorkbook(_) => ErrorKind::MalformedData,
            RetailError::Config(_) => ErrorKind::Config,
            RetailError::Other(_) => ErrorKind::Other,
        }
    }
}

/// Convenience alias used throughout the retail crates.
pub type Result<T> = std::result::Result<T, RetailError>;
