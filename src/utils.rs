use crate::error::{AppError, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

/// Get settlement data directory from environment variable or use default
pub fn get_data_dir() -> PathBuf {
    std::env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Read an optional path override, falling back to `default`
pub fn get_path_env(name: &str, default: PathBuf) -> PathBuf {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default,
    }
}

/// Read a string variable with a default
pub fn get_string_env(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Read a numeric variable; unset uses `default`, garbage is a config error
pub fn get_parsed_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("{}='{}': {}", name, value, e))),
        _ => Ok(default),
    }
}

/// Parse a trading date in YYYY-MM-DD format
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::InvalidInput(format!(
            "Invalid date format: {}. Use YYYY-MM-DD format.",
            input
        ))
    })
}

/// Insert thousands separators: 1234567 -> "1,234,567"
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `level` (from `LOG_LEVEL`) is used.
pub fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2023-08-22").unwrap(),
            NaiveDate::from_ymd_opt(2023, 8, 22).unwrap()
        );
        assert_eq!(
            parse_date(" 2024-02-29 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("22/08/2023").is_err());
        assert!(parse_date("2023-02-30").is_err());
        assert!(matches!(parse_date(""), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
