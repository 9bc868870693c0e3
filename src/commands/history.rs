use super::{open_pipeline, parse_date_arg};
use crate::config::Settings;

pub async fn run(settings: &Settings, symbol: &str, start: Option<&str>, end: Option<&str>) {
    let start = start.map(parse_date_arg);
    let end = end.map(parse_date_arg);

    let pipeline = open_pipeline(settings).await;
    let result = pipeline.series_history(symbol, start, end).await;
    pipeline.close().await;

    let points = match result {
        Ok(points) => points,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    if points.is_empty() {
        println!("❌ No history found for series '{}'", symbol);
        return;
    }

    println!("📈 History for {} ({} points)", symbol, points.len());
    println!("{}", "-".repeat(72));
    println!(
        "{:<12} {:<12} {:>10} {:<8} {:>12} {:>8} {:>8}",
        "Date", "Expiry", "Strike", "Call/Put", "Settlement", "Volume", "OI"
    );
    println!("{}", "-".repeat(72));
    for point in &points {
        println!(
            "{:<12} {:<12} {:>10.2} {:<8} {:>12.4} {:>8} {:>8}",
            point.time.to_string(),
            point.expiry,
            point.strike,
            point.call_put.as_str(),
            point.settlement_price,
            point.volume,
            point.open_interest
        );
    }
}
