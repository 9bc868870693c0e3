use super::{open_pipeline, parse_date_arg};
use crate::config::Settings;

pub async fn run(settings: &Settings, date: &str) {
    let trading_date = parse_date_arg(date);
    let pipeline = open_pipeline(settings).await;
    let result = pipeline.symbols_for_date(trading_date).await;
    pipeline.close().await;

    let symbols = match result {
        Ok(symbols) => symbols,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    if symbols.is_empty() {
        println!("❌ No data available for {}", trading_date);
        return;
    }

    println!("📊 Symbols available for {}:", trading_date);
    println!("{}", "-".repeat(40));
    for (i, symbol) in symbols.iter().enumerate() {
        println!("{:>3}. {}", i + 1, symbol);
    }
    println!("\nTotal: {} symbols", symbols.len());
}
