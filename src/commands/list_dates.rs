use super::open_pipeline;
use crate::config::Settings;
use crate::utils::format_number;

pub async fn run(settings: &Settings) {
    let pipeline = open_pipeline(settings).await;
    let dates = pipeline.get_trading_dates().await;
    pipeline.close().await;

    if dates.is_empty() {
        println!("❌ No trading dates available");
        return;
    }

    println!("📅 Available Trading Dates:");
    println!("{}", "-".repeat(60));
    println!("{:<12} {:>10} {:<12} {}", "Date", "Records", "Status", "Download Time");
    println!("{}", "-".repeat(60));

    for summary in &dates {
        println!(
            "{:<12} {:>10} {:<12} {}",
            summary.trading_date.to_string(),
            format_number(summary.total_records),
            summary.status.as_str(),
            summary.download_timestamp.format("%Y-%m-%d %H:%M")
        );
    }

    println!("\nTotal: {} dates", dates.len());
}
