use super::{open_pipeline, parse_date_arg};
use crate::config::Settings;
use crate::utils::format_number;

pub async fn run(settings: &Settings, date: &str) {
    let trading_date = parse_date_arg(date);
    println!("📥 Downloading settlement data for {}...", trading_date);

    let pipeline = open_pipeline(settings).await;
    let result = pipeline.download_and_parse(trading_date).await;
    pipeline.close().await;

    if !result.is_success() {
        eprintln!("❌ Download failed: {}", result.message);
        std::process::exit(1);
    }

    println!("✅ Successfully downloaded {} records", format_number(result.records_count));
    println!("📅 Trading Date:  {}", result.trading_date);
    println!("⏰ Download Time: {}", result.download_timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    if result.dropped_rows > 0 {
        println!("⚠️  Skipped {} invalid rows", format_number(result.dropped_rows));
    }
    if result.documents_ok == Some(false) {
        println!("⚠️  Document store write failed");
    }
    if result.timeseries_ok == Some(false) {
        println!("⚠️  Time-series store write failed");
    }
}
