use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::{Result, RetailError};

/// Text layout used when a spreadsheet date cell is stored as a string.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Timestamp parsing ─────────────────────────────────────────────────────────

/// Date-time patterns tried in order after RFC 3339.
///
/// Slash dates are month-first, matching the Online Retail export.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// First serial past 9999-12-31.
const MAX_EXCEL_SERIAL: f64 = 2_958_466.0;

/// Parse an invoice timestamp into a naive date-time.
///
/// Offsets (including a `Z` suffix) are dropped and the wall-clock time
/// written in the string is kept, so a row lands in the quarter of its own
/// local date. Returns [`RetailError::TimestampParse`] when no known layout
/// matches.
pub fn parse_invoice_timestamp(s: &str) -> Result<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(RetailError::TimestampParse(s.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(naive);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(naive);
            }
        }
    }

    warn!("could not parse invoice timestamp \"{}\"", s);
    Err(RetailError::TimestampParse(s.to_string()))
}

/// Convert an Excel serial day number (1900 date system) to a date-time.
///
/// The fractional part is the time of day. Serials from `61.0`
/// (1900-03-01) onward match Excel exactly; `1.0..61.0` land one day early
/// because Excel counts a 1900-02-29 that never existed. Returns `None` for
/// non-finite serials and those outside `1.0..2958466.0`.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(1.0..MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

// ── Quarter ───────────────────────────────────────────────────────────────────

/// A calendar quarter tagged with its year.
///
/// Ordered chronologically and labelled like `2023Q1`.
///
/// ```
/// use chrono::NaiveDate;
/// use retail_core::time_utils::Quarter;
///
/// let date = NaiveDate::from_ymd_opt(2023, 4, 2).unwrap();
/// assert_eq!(Quarter::from_date(date).to_string(), "2023Q2");
/// assert_eq!("2010Q4".parse::<Quarter>().unwrap(), Quarter::new(2010, 4).unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quarter {
    year: i32,
    quarter: u8,
}

impl Quarter {
    /// Build a quarter; `quarter` must be in `1..=4`.
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Self { year, quarter })
    }

    /// The quarter containing `date` (Jan–Mar → Q1 … Oct–Dec → Q4).
    pub fn from_date(date: impl Datelike) -> Self {
        Self {
            year: date.year(),
            quarter: ((date.month0() / 3) + 1) as u8,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u8 {
        self.quarter
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

impl FromStr for Quarter {
    type Err = RetailError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || RetailError::Config(format!("invalid quarter label: {s}"));
        let (year, q) = s.split_once(['Q', 'q']).ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let q: u8 = q.parse().map_err(|_| invalid())?;
        Quarter::new(year, q).ok_or_else(invalid)
    }
}

impl Serialize for Quarter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quarter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
