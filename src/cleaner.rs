use std::io::Read;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, SpendError};
use crate::models::{ParsedRow, RejectReason, RejectedRow};

pub const DATE_COLUMN: &str = "Date";
pub const DESCRIPTION_COLUMN: &str = "Transaction Name";
pub const AMOUNT_COLUMN: &str = "Amount";

static NON_NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9.\-]").unwrap());

// Month-first layouts go before year-first ones and two-digit years before
// four-digit ones: `%Y` accepts one to four digits, so "01/05/24" would
// otherwise parse as year 1.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%y",
    "%m-%d-%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Strip everything except digits, `.` and `-`, then parse.
pub fn clean_amount(raw: &str) -> Option<f64> {
    let stripped = NON_NUMERIC.replace_all(raw, "");
    if stripped.is_empty() {
        return None;
    }
    stripped.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a date in any of the common bank-export layouts. Numeric dates are
/// read month-first; any time of day is dropped.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}

#[derive(Debug, Default)]
pub struct CleanOutput {
    pub rows: Vec<ParsedRow>,
    pub rejected: Vec<RejectedRow>,
    pub rows_read: usize,
}

struct ColumnIndex {
    date: usize,
    description: usize,
    amount: usize,
}

fn locate_columns(headers: &csv::StringRecord) -> Result<ColumnIndex> {
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
            .ok_or_else(|| SpendError::MissingColumn(name.to_string()))
    };
    Ok(ColumnIndex {
        date: find(DATE_COLUMN)?,
        description: find(DESCRIPTION_COLUMN)?,
        amount: find(AMOUNT_COLUMN)?,
    })
}

/// Normalize raw CSV rows into typed rows. Rows with an unparsable date or
/// amount are set aside in `rejected`; they never fail the batch.
pub fn clean<R: Read>(reader: R) -> Result<CleanOutput> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let columns = locate_columns(rdr.headers()?)?;

    let mut out = CleanOutput::default();
    for result in rdr.records() {
        out.rows_read += 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                out.rejected.push(RejectedRow {
                    line,
                    reason: RejectReason::Malformed(e.to_string()),
                });
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let raw_amount = record.get(columns.amount).unwrap_or("");
        let Some(amount) = clean_amount(raw_amount) else {
            out.rejected.push(RejectedRow {
                line,
                reason: RejectReason::UnparsableAmount(raw_amount.to_string()),
            });
            continue;
        };

        let raw_date = record.get(columns.date).unwrap_or("");
        let Some(date) = parse_date(raw_date) else {
            out.rejected.push(RejectedRow {
                line,
                reason: RejectReason::UnparsableDate(raw_date.to_string()),
            });
            continue;
        };

        let description = record
            .get(columns.description)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        out.rows.push(ParsedRow {
            date,
            description,
            amount,
        });
    }

    for rejected in &out.rejected {
        debug!(line = rejected.line, reason = %rejected.reason, "dropped row");
    }
    info!(
        read = out.rows_read,
        kept = out.rows.len(),
        dropped = out.rejected.len(),
        "cleaned input"
    );
    Ok(out)
}
