use super::{open_pipeline, parse_date_arg};
use crate::config::Settings;
use crate::models::StoredSettlementRecord;

pub async fn run(settings: &Settings, symbol: &str, date: Option<&str>) {
    let trading_date = date.map(parse_date_arg);
    let pipeline = open_pipeline(settings).await;

    let records = match trading_date {
        Some(trading_date) => pipeline.search_symbol(symbol, trading_date).await,
        None => match pipeline.search_latest(symbol).await {
            Some((latest, records)) => {
                println!("🔍 Searching in latest available date: {}", latest);
                records
            }
            None => {
                pipeline.close().await;
                eprintln!("❌ No trading dates available");
                std::process::exit(1);
            }
        },
    };
    pipeline.close().await;

    if records.is_empty() {
        println!("❌ No records found for symbol '{}'", symbol);
        return;
    }

    println!("✅ Found {} records for symbol '{}'", records.len(), symbol);
    print_records(&records);
}

fn print_records(records: &[StoredSettlementRecord]) {
    println!("\n📊 Settlement Records:");
    println!("{}", "-".repeat(80));
    println!(
        "{:<15} {:<12} {:>10} {:<8} {:>12} {:>8} {:>8}",
        "Series", "Expiry", "Strike", "Call/Put", "Settlement", "Volume", "OI"
    );
    println!("{}", "-".repeat(80));

    for stored in records {
        let r = &stored.record;
        println!(
            "{:<15} {:<12} {:>10.2} {:<8} {:>12.4} {:>8} {:>8}",
            r.series, r.expiry, r.strike, r.call_put.as_str(), r.settlement_price, r.volume, r.open_interest
        );
    }
}
