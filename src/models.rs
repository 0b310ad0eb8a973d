use chrono::NaiveDate;
use serde::Serialize;

/// Category assigned when a row has no description.
pub const MISSING_CATEGORY: &str = "Missing";
/// Category assigned when no keyword matches.
pub const FALLBACK_CATEGORY: &str = "Miscellaneous";

/// A row that survived cleaning, before categorization and scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub date: NaiveDate,
    pub description: Option<String>,
    pub amount: f64,
}

/// The canonical enriched transaction, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: Option<String>,
    pub amount: f64,
    pub category: String,
    pub is_anomaly: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RejectReason {
    UnparsableDate(String),
    UnparsableAmount(String),
    Malformed(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnparsableDate(raw) => write!(f, "unparsable date '{raw}'"),
            Self::UnparsableAmount(raw) => write!(f, "unparsable amount '{raw}'"),
            Self::Malformed(msg) => write!(f, "malformed record: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// 1-based line number in the source file.
    pub line: u64,
    pub reason: RejectReason,
}
