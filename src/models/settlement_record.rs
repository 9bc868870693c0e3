use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Option side of a settlement quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "Call",
            OptionType::Put => "Put",
        }
    }
}

impl FromStr for OptionType {
    type Err = String;

    /// Accepts `Call`/`C` and `Put`/`P`, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            _ => Err(format!("Invalid call/put value: '{}'", s)),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One parsed contract quote from a settlement file
///
/// Every field is present and coerced; a row that cannot be coerced never
/// becomes a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Contract series code (e.g. `HTI2308`)
    pub series: String,

    /// Expiry token as printed in the file, not validated as a date
    pub expiry: String,

    pub strike: f64,

    pub call_put: OptionType,

    pub settlement_price: f64,

    pub volume: u64,

    pub open_interest: u64,
}

/// A settlement record as read back from the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSettlementRecord {
    pub trading_date: NaiveDate,

    #[serde(flatten)]
    pub record: SettlementRecord,

    /// When the row was last written
    pub created_at: DateTime<Utc>,
}
