use super::open_pipeline;
use crate::config::Settings;
use crate::storage::ConnectionState;

fn describe(state: ConnectionState) -> &'static str {
    if state.is_connected() {
        "✅ Connected"
    } else {
        "❌ Disconnected"
    }
}

pub async fn run(settings: &Settings) {
    println!("🏥 Health Check:");
    println!("{}", "-".repeat(30));

    let pipeline = open_pipeline(settings).await;
    let health = pipeline.health().await;
    pipeline.close().await;

    println!("Cache:       {}", describe(health.cache));
    println!("Time series: {}", describe(health.timeseries));
    println!("Documents:   {}", describe(health.documents));

    if health.all_connected() {
        println!("\n✅ All services are healthy!");
    } else {
        println!("\n❌ Some services are not healthy!");
        std::process::exit(1);
    }
}
