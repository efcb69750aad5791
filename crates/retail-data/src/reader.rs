//! Transaction file loading.
//!
//! Reads an `.xlsx` workbook or a `.csv` file into a typed
//! [`TransactionTable`]. Columns are resolved by header name once, then every
//! data row is converted into a [`TransactionRow`]. Empty cells become
//! missing values and rows without a stock code are skipped; the first cell
//! that holds text of the wrong type aborts the whole load.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use chrono::NaiveDateTime;
use retail_core::error::{Result, RetailError};
use retail_core::models::{TransactionRow, TransactionTable};
use retail_core::time_utils::{excel_serial_to_datetime, CANONICAL_FORMAT};
use tracing::debug;

/// Header names of the columns every input must carry.
pub const CUSTOMER_ID: &str = "CustomerID";
pub const STOCK_CODE: &str = "StockCode";
pub const QUANTITY: &str = "Quantity";
pub const UNIT_PRICE: &str = "UnitPrice";
pub const INVOICE_DATE: &str = "InvoiceDate";

/// Cell texts read as missing values.
const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "NULL", "null", "None"];

// ── TableFormat ───────────────────────────────────────────────────────────────

/// The two supported input layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// `.xlsx` workbook; the first worksheet is read.
    Spreadsheet,
    /// `.csv` with a header row.
    Delimited,
}

impl TableFormat {
    /// Pick the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "xlsx" => Ok(TableFormat::Spreadsheet),
            "csv" => Ok(TableFormat::Delimited),
            _ => Err(RetailError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load every transaction row from `path`.
pub fn load_transactions(path: &Path) -> Result<TransactionTable> {
    let format = TableFormat::from_path(path)?;
    let table = match format {
        TableFormat::Spreadsheet => read_xlsx(path)?,
        TableFormat::Delimited => read_csv(path)?,
    };

    debug!(
        "Loaded {} rows from {} ({:?})",
        table.len(),
        path.display(),
        format
    );

    Ok(table)
}

// ── Readers ───────────────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| RetailError::FileRead {
            path: path.to_path_buf(),
            source,
        })
}

fn read_csv(path: &Path) -> Result<TransactionTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(open(path)?);

    // Byte records so Latin-1 exports do not abort the load.
    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();
    let columns = ColumnIndex::resolve(&headers)?;

    let mut rows = RowCollector::default();
    for (i, result) in reader.byte_records().enumerate() {
        let record = result?;
        let line = i + 2;
        rows.push(columns.build_row(line, |idx| {
            record
                .get(idx)
                .map(|b| CellValue::Text(String::from_utf8_lossy(b).into_owned()))
                .unwrap_or(CellValue::Empty)
        })?);
    }

    Ok(rows.finish())
}

fn read_xlsx(path: &Path) -> Result<TransactionTable> {
    let workbook_error = |e: calamine::XlsxError| RetailError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut workbook: Xlsx<_> = Xlsx::new(open(path)?).map_err(workbook_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RetailError::EmptyWorkbook(path.to_path_buf()))?
        .map_err(workbook_error)?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .ok_or_else(|| RetailError::EmptyWorkbook(path.to_path_buf()))?
        .iter()
        .map(|c| c.to_string())
        .collect();
    let columns = ColumnIndex::resolve(&headers)?;

    let mut rows = RowCollector::default();
    for (i, sheet_row) in sheet_rows.enumerate() {
        if sheet_row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let line = i + 2;
        rows.push(columns.build_row(line, |idx| {
            sheet_row.get(idx).map(cell_value).unwrap_or(CellValue::Empty)
        })?);
    }

    Ok(rows.finish())
}

/// Accumulates converted rows and counts the ones skipped for lacking a
/// stock code.
#[derive(Default)]
struct RowCollector {
    rows: Vec<TransactionRow>,
    skipped: usize,
}

impl RowCollector {
    fn push(&mut self, row: Option<TransactionRow>) {
        match row {
            Some(row) => self.rows.push(row),
            None => self.skipped += 1,
        }
    }

    fn finish(self) -> TransactionTable {
        if self.skipped > 0 {
            debug!("Skipped {} rows without a stock code", self.skipped);
        }
        TransactionTable::new(self.rows)
    }
}

// ── Cells ─────────────────────────────────────────────────────────────────────

/// Source-independent view of one cell.
#[derive(Debug, Clone, PartialEq)]
enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Float(dt.as_f64())),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

fn is_null_token(s: &str) -> bool {
    NULL_TOKENS.contains(&s.trim())
}

/// Empty cells, null tokens and NaN all read as a missing value.
fn is_missing(cell: &CellValue) -> bool {
    match cell {
        CellValue::Empty => true,
        CellValue::Text(s) => is_null_token(s),
        CellValue::Float(f) => f.is_nan(),
        CellValue::Int(_) | CellValue::DateTime(_) => false,
    }
}

/// An integral float that fits in an `i64`.
fn integral_float(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the exclusive upper bound.
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

/// `17850.0` → `"17850"`; other floats keep their natural rendering.
fn render_float(f: f64) -> String {
    match integral_float(f) {
        Some(i) => i.to_string(),
        None => f.to_string(),
    }
}

/// Text identifiers that spell an integral float lose the `.0` too.
fn normalise_identifier(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.contains('.') {
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.fract() == 0.0 {
                return render_float(f);
            }
        }
    }
    trimmed.to_string()
}

fn identifier(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => None,
        CellValue::Text(s) if is_null_token(s) => None,
        CellValue::Text(s) => Some(normalise_identifier(s)),
        CellValue::Int(i) => Some(i.to_string()),
        CellValue::Float(f) if f.is_nan() => None,
        CellValue::Float(f) => Some(render_float(*f)),
        CellValue::DateTime(dt) => Some(dt.format(CANONICAL_FORMAT).to_string()),
    }
}

fn integer(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Int(i) => Some(*i),
        CellValue::Float(f) => integral_float(*f),
        CellValue::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_float))
        }
        CellValue::Empty | CellValue::DateTime(_) => None,
    }
}

fn decimal(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Int(i) => Some(*i as f64),
        CellValue::Float(f) if f.is_finite() => Some(*f),
        CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn timestamp_text(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => Some(String::new()),
        CellValue::Text(s) => Some(s.trim().to_string()),
        CellValue::DateTime(dt) => Some(dt.format(CANONICAL_FORMAT).to_string()),
        CellValue::Int(i) => excel_serial_to_datetime(*i as f64)
            .map(|dt| dt.format(CANONICAL_FORMAT).to_string()),
        CellValue::Float(f) => {
            excel_serial_to_datetime(*f).map(|dt| dt.format(CANONICAL_FORMAT).to_string())
        }
    }
}

fn describe(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.clone(),
        CellValue::Int(i) => i.to_string(),
        CellValue::Float(f) => f.to_string(),
        CellValue::DateTime(dt) => dt.format(CANONICAL_FORMAT).to_string(),
    }
}

// ── ColumnIndex ───────────────────────────────────────────────────────────────

/// Positions of the required columns within a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnIndex {
    customer_id: usize,
    stock_code: usize,
    quantity: usize,
    unit_price: usize,
    invoice_date: usize,
}

impl ColumnIndex {
    fn resolve(headers: &[String]) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .or_else(|| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name)))
                .ok_or_else(|| RetailError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            customer_id: find(CUSTOMER_ID)?,
            stock_code: find(STOCK_CODE)?,
            quantity: find(QUANTITY)?,
            unit_price: find(UNIT_PRICE)?,
            invoice_date: find(INVOICE_DATE)?,
        })
    }

    /// Convert one data row; `line` is the 1-based row number in the source.
    ///
    /// Returns `Ok(None)` when the stock code is missing.
    fn build_row(
        &self,
        line: usize,
        cell: impl Fn(usize) -> CellValue,
    ) -> Result<Option<TransactionRow>> {
        let malformed = |column: &str, value: &CellValue| RetailError::MalformedValue {
            row: line,
            column: column.to_string(),
            value: describe(value),
        };

        let Some(stock_code) = identifier(&cell(self.stock_code)) else {
            return Ok(None);
        };

        let quantity_cell = cell(self.quantity);
        let quantity = if is_missing(&quantity_cell) {
            None
        } else {
            Some(integer(&quantity_cell).ok_or_else(|| malformed(QUANTITY, &quantity_cell))?)
        };

        let price_cell = cell(self.unit_price);
        let unit_price = if is_missing(&price_cell) {
            None
        } else {
            Some(decimal(&price_cell).ok_or_else(|| malformed(UNIT_PRICE, &price_cell))?)
        };

        let date_cell = cell(self.invoice_date);
        let invoice_date =
            timestamp_text(&date_cell).ok_or_else(|| malformed(INVOICE_DATE, &date_cell))?;

        Ok(Some(TransactionRow {
            customer_id: identifier(&cell(self.customer_id)),
            stock_code,
            quantity,
            unit_price,
            invoice_date,
        }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
