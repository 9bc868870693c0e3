pub mod download;
pub mod health;
pub mod history;
pub mod list_dates;
pub mod search;
pub mod serve;
pub mod symbols;

use crate::config::Settings;
use crate::services::SettlementPipeline;
use crate::utils::parse_date;
use chrono::NaiveDate;

/// Connect the stores or exit
pub(crate) async fn open_pipeline(settings: &Settings) -> SettlementPipeline {
    match SettlementPipeline::from_settings(settings).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("❌ Failed to connect to storage: {}", e);
            std::process::exit(1);
        }
    }
}

/// Parse a YYYY-MM-DD argument or exit
pub(crate) fn parse_date_arg(input: &str) -> NaiveDate {
    match parse_date(input) {
        Ok(date) => date,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}
