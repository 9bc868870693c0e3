use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome recorded for a processed trading date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Completed,
    Error,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStatus::Completed => "completed",
            SummaryStatus::Error => "error",
        }
    }
}

impl FromStr for SummaryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(SummaryStatus::Completed),
            "error" => Ok(SummaryStatus::Error),
            _ => Err(format!("Invalid summary status: '{}'", s)),
        }
    }
}

impl fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the trading date index kept by the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingDateSummary {
    pub trading_date: NaiveDate,
    pub total_records: u64,
    pub download_timestamp: DateTime<Utc>,
    pub status: SummaryStatus,
}

/// Last-run metadata for a date, kept in the cache store's config namespace
///
/// Unlike [`TradingDateSummary`] this is written for failed runs too, and
/// carries the per-store outcome of the fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub trading_date: NaiveDate,
    pub total_records: u64,
    pub dropped_rows: u64,
    pub download_timestamp: DateTime<Utc>,
    pub status: SummaryStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeseries_ok: Option<bool>,
}
