//! Settlement file parser
//!
//! Turns the raw text of an `spDDMMYY.dat` file into [`SettlementRecord`]s in
//! three steps:
//!
//! 1. [`locate_header`] finds the first line starting with `Series`.
//! 2. [`tokenize`] splits the header and every following non-blank line on
//!    whitespace into a [`RawTable`].
//! 3. [`normalize_rows`] maps each token row onto the header columns and
//!    coerces the numeric fields. Rows that do not fit are dropped and counted.
//!
//! Everything here is pure and deterministic: the same text always yields the
//! same records in source order.

use crate::constants::{column, COMPOUND_COLUMNS, HEADER_SENTINEL};
use crate::error::{AppError, Result};
use crate::models::{OptionType, SettlementRecord};
use std::collections::HashSet;
use tracing::debug;

/// Header columns plus the whitespace-split data rows that follow it
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Column names from the header line, compound names joined
    pub columns: Vec<String>,
    /// One token list per non-blank data line, in file order
    pub rows: Vec<Vec<String>>,
}

/// Result of normalizing a [`RawTable`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedRows {
    pub records: Vec<SettlementRecord>,
    /// Rows discarded for a column-count mismatch, a failed coercion or a missing column
    pub dropped: usize,
}

/// A fully parsed settlement document
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub records: Vec<SettlementRecord>,
    pub dropped_rows: usize,
}

/// Index of the first line whose trimmed content starts with `Series`
pub fn locate_header<S: AsRef<str>>(lines: &[S]) -> Result<usize> {
    lines
        .iter()
        .position(|line| line.as_ref().trim().starts_with(HEADER_SENTINEL))
        .ok_or(AppError::HeaderNotFound)
}

/// Split the header at `header_idx` into columns and every later non-blank line into tokens.
///
/// Token counts are not checked against the column count here.
pub fn tokenize<S: AsRef<str>>(lines: &[S], header_idx: usize) -> Result<RawTable> {
    let header = lines
        .get(header_idx)
        .ok_or_else(|| AppError::Parse(format!("Header index {} out of range", header_idx)))?;

    let columns = split_header(header.as_ref());

    let mut seen = HashSet::new();
    for name in &columns {
        if !seen.insert(name.as_str()) {
            return Err(AppError::Parse(format!("Duplicate column in header: '{}'", name)));
        }
    }

    let rows = lines[header_idx + 1..]
        .iter()
        .map(|line| line.as_ref())
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect();

    Ok(RawTable { columns, rows })
}

/// Whitespace-split a header line, joining the known multi-word column names
fn split_header(line: &str) -> Vec<String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut columns = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let compound = COMPOUND_COLUMNS
            .iter()
            .find(|parts| tokens[i..].starts_with(parts));

        match compound {
            Some(parts) => {
                columns.push(parts.join(" "));
                i += parts.len();
            }
            None => {
                columns.push(tokens[i].to_string());
                i += 1;
            }
        }
    }

    columns
}

/// Positions of the required columns within the header
struct ColumnIndex {
    series: usize,
    expiry: usize,
    strike: usize,
    call_put: usize,
    settlement: usize,
    volume: usize,
    open_interest: usize,
}

impl ColumnIndex {
    fn resolve(columns: &[String]) -> std::result::Result<Self, &'static str> {
        let find = |name: &'static str| {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or(name)
        };

        Ok(Self {
            series: find(column::SERIES)?,
            expiry: find(column::EXPIRY)?,
            strike: find(column::STRIKE)?,
            call_put: find(column::CALL_PUT)?,
            settlement: find(column::SETTLEMENT)?,
            volume: find(column::VOLUME)?,
            open_interest: find(column::OPEN_INTEREST)?,
        })
    }
}

/// Map each raw row onto the header and coerce it into a [`SettlementRecord`].
///
/// A row is dropped when its token count differs from the column count, when
/// any numeric or call/put coercion fails, or when the header lacks a required
/// column (then every row is dropped). Order is preserved and nothing is
/// deduplicated.
pub fn normalize_rows(table: &RawTable) -> NormalizedRows {
    let index = match ColumnIndex::resolve(&table.columns) {
        Ok(index) => index,
        Err(missing) => {
            debug!(column = missing, rows = table.rows.len(), "Required column missing, dropping all rows");
            return NormalizedRows {
                records: Vec::new(),
                dropped: table.rows.len(),
            };
        }
    };

    let mut normalized = NormalizedRows::default();

    for (row_no, row) in table.rows.iter().enumerate() {
        if row.len() != table.columns.len() {
            debug!(
                row = row_no,
                tokens = row.len(),
                columns = table.columns.len(),
                "Skipping row with mismatched token count"
            );
            normalized.dropped += 1;
            continue;
        }

        match coerce_row(row, &index) {
            Ok(record) => normalized.records.push(record),
            Err(reason) => {
                debug!(row = row_no, reason = %reason, "Skipping invalid row");
                normalized.dropped += 1;
            }
        }
    }

    normalized
}

fn coerce_row(row: &[String], index: &ColumnIndex) -> std::result::Result<SettlementRecord, String> {
    Ok(SettlementRecord {
        series: row[index.series].clone(),
        expiry: row[index.expiry].clone(),
        strike: parse_decimal(&row[index.strike], column::STRIKE)?,
        call_put: row[index.call_put].parse::<OptionType>()?,
        settlement_price: parse_decimal(&row[index.settlement], column::SETTLEMENT)?,
        volume: parse_count(&row[index.volume], column::VOLUME)?,
        open_interest: parse_count(&row[index.open_interest], column::OPEN_INTEREST)?,
    })
}

fn parse_decimal(token: &str, name: &str) -> std::result::Result<f64, String> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("{}: '{}' is not a number", name, token)),
    }
}

/// Non-negative integer that fits a signed 64-bit store column
fn parse_count(token: &str, name: &str) -> std::result::Result<u64, String> {
    match token.parse::<u64>() {
        Ok(value) if i64::try_from(value).is_ok() => Ok(value),
        Ok(_) => Err(format!("{}: '{}' is out of range", name, token)),
        Err(_) => Err(format!("{}: '{}' is not a non-negative integer", name, token)),
    }
}

/// Locate, tokenize and normalize a whole document
pub fn parse_document(text: &str) -> Result<ParsedDocument> {
    let lines: Vec<&str> = text.lines().collect();
    let header_idx = locate_header(&lines)?;
    let table = tokenize(&lines, header_idx)?;
    let normalized = normalize_rows(&table);

    debug!(
        header_line = header_idx,
        records = normalized.records.len(),
        dropped = normalized.dropped,
        "Parsed settlement document"
    );

    Ok(ParsedDocument {
        records: normalized.records,
        dropped_rows: normalized.dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Series Expiry Strike Call/Put Settlement Volume Open Interest";

    const SAMPLE: &str = "Header Line
Series Expiry Strike Call/Put Settlement Volume Open Interest
HTI2308 2023-08-25 18000 Call 0.1234 100 50
HTI2308 2023-08-25 18500 Put 0.5678 200 75
HSI2308 2023-08-25 19000 Call 0.9012 150 60";

    #[test]
    fn test_locate_header() {
        let lines = vec!["HKEX daily report", "", "   Series Expiry Strike", "HTI2308"];
        assert_eq!(locate_header(&lines).unwrap(), 2);
    }

    #[test]
    fn test_locate_header_first_match_wins() {
        let lines = vec!["Series A", "Series B"];
        assert_eq!(locate_header(&lines).unwrap(), 0);
    }

    #[test]
    fn test_locate_header_missing() {
        let lines = vec!["Some random data", "More data", "  series lowercase"];
        assert!(matches!(locate_header(&lines), Err(AppError::HeaderNotFound)));

        let empty: Vec<&str> = Vec::new();
        assert!(matches!(locate_header(&empty), Err(AppError::HeaderNotFound)));
    }

    #[test]
    fn test_split_header_joins_open_interest() {
        assert_eq!(
            split_header(HEADER),
            vec!["Series", "Expiry", "Strike", "Call/Put", "Settlement", "Volume", "Open Interest"]
        );
        // A lone "Open" is kept as-is
        assert_eq!(split_header("Series Open"), vec!["Series", "Open"]);
    }

    #[test]
    fn test_tokenize_skips_blank_lines() {
        let lines = vec!["preamble", HEADER, "", "A 1 2 Call 3 4 5", "   ", "\t", "B 1 2 Put 3 4 5", ""];
        let table = tokenize(&lines, 1).unwrap();

        assert_eq!(table.columns.len(), 7);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "A");
        assert_eq!(table.rows[1][0], "B");
    }

    #[test]
    fn test_tokenize_keeps_short_rows() {
        let lines = vec![HEADER, "HTI2308 2023-08-25"];
        let table = tokenize(&lines, 0).unwrap();
        assert_eq!(table.rows, vec![vec!["HTI2308".to_string(), "2023-08-25".to_string()]]);
    }

    #[test]
    fn test_tokenize_rejects_duplicate_columns() {
        let lines = vec!["Series Strike Strike"];
        assert!(matches!(tokenize(&lines, 0), Err(AppError::Parse(_))));
    }

    #[test]
    fn test_parse_single_record() {
        let text = "Series Expiry Strike Call/Put Settlement Volume Open Interest\nHTI2308 2023-08-25 18000 Call 0.1234 100 50";
        let parsed = parse_document(text).unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.dropped_rows, 0);
        let record = &parsed.records[0];
        assert_eq!(record.series, "HTI2308");
        assert_eq!(record.expiry, "2023-08-25");
        assert_eq!(record.strike, 18000.0);
        assert_eq!(record.call_put, OptionType::Call);
        assert_eq!(record.settlement_price, 0.1234);
        assert_eq!(record.volume, 100);
        assert_eq!(record.open_interest, 50);
    }

    #[test]
    fn test_parse_sample_preserves_order() {
        let parsed = parse_document(SAMPLE).unwrap();
        let series: Vec<_> = parsed
            .records
            .iter()
            .map(|r| (r.series.as_str(), r.strike))
            .collect();

        assert_eq!(
            series,
            vec![("HTI2308", 18000.0), ("HTI2308", 18500.0), ("HSI2308", 19000.0)]
        );
        assert_eq!(parsed.records[1].call_put, OptionType::Put);
        assert_eq!(parsed.records[1].open_interest, 75);
    }

    #[test]
    fn test_parse_invalid_strike_drops_row() {
        let text = "Header Line
Series Expiry Strike Call/Put Settlement Volume Open Interest
HTI2308 2023-08-25 invalid Call 0.1234 100 50";
        let parsed = parse_document(text).unwrap();

        assert!(parsed.records.is_empty());
        assert_eq!(parsed.dropped_rows, 1);
    }

    #[test]
    fn test_parse_each_numeric_field_is_checked() {
        let text = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}",
            HEADER,
            "OK1 2023-08-25 18000 Call 0.5 10 5",
            "BAD 2023-08-25 18000 Call abc 10 5",
            "BAD 2023-08-25 18000 Call 0.5 ten 5",
            "BAD 2023-08-25 18000 Call 0.5 10 -5",
            "BAD 2023-08-25 NaN Call 0.5 10 5",
            "OK2 2023-08-25 18000 Put 0.5 10 5",
        );
        let parsed = parse_document(&text).unwrap();

        let kept: Vec<_> = parsed.records.iter().map(|r| r.series.as_str()).collect();
        assert_eq!(kept, vec!["OK1", "OK2"]);
        assert_eq!(parsed.dropped_rows, 4);
    }

    #[test]
    fn test_parse_token_count_mismatch_drops_row() {
        let text = format!(
            "{}\n{}\n{}\n{}",
            HEADER,
            "SHORT 2023-08-25 18000 Call 0.5 10",
            "LONG 2023-08-25 18000 Call 0.5 10 5 extra",
            "GOOD 2023-08-25 18000 Call 0.5 10 5",
        );
        let parsed = parse_document(&text).unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].series, "GOOD");
        assert_eq!(parsed.dropped_rows, 2);
    }

    #[test]
    fn test_parse_unknown_call_put_drops_row() {
        let text = format!("{}\nHTI2308 2023-08-25 18000 Straddle 0.5 10 5", HEADER);
        let parsed = parse_document(&text).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.dropped_rows, 1);
    }

    #[test]
    fn test_parse_missing_required_column_drops_everything() {
        let text = "Series Expiry Strike Call/Put Settlement Volume\nHTI2308 2023-08-25 18000 Call 0.5 10";
        let parsed = parse_document(text).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.dropped_rows, 1);
    }

    #[test]
    fn test_parse_columns_in_any_order() {
        let text = "Strike Series Call/Put Expiry Volume Settlement Open Interest\n18000 HTI2308 P 2023-08-25 7 1.5 3";
        let parsed = parse_document(text).unwrap();

        assert_eq!(parsed.records.len(), 1);
        let record = &parsed.records[0];
        assert_eq!(record.series, "HTI2308");
        assert_eq!(record.call_put, OptionType::Put);
        assert_eq!(record.settlement_price, 1.5);
        assert_eq!(record.volume, 7);
    }

    #[test]
    fn test_parse_drops_counts_beyond_i64() {
        let text = format!(
            "{}\nHTI2308 2023-08-25 18000 Call 0.1 18446744073709551615 50\nHTI2308 2023-08-25 18500 Call 0.2 9223372036854775807 50",
            HEADER
        );
        let parsed = parse_document(&text).unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].volume, i64::MAX as u64);
        assert_eq!(parsed.dropped_rows, 1);
    }

    #[test]
    fn test_parse_header_only() {
        let parsed = parse_document(HEADER).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.dropped_rows, 0);
    }

    #[test]
    fn test_parse_no_header() {
        let result = parse_document("Some random data\nMore data");
        assert!(matches!(result, Err(AppError::HeaderNotFound)));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = parse_document(SAMPLE).unwrap();
        let second = parse_document(SAMPLE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_handles_crlf_and_tabs() {
        let text = "report\r\nSeries\tExpiry Strike Call/Put Settlement Volume Open   Interest\r\nHTI2308\t2023-08-25  18000 Call 0.1 1 2\r\n\r\n";
        let parsed = parse_document(text).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].open_interest, 2);
    }
}
