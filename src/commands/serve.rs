use super::open_pipeline;
use crate::config::Settings;
use crate::server::{self, AppState};
use std::sync::Arc;

pub async fn run(settings: &Settings, port: u16) {
    println!("🚀 Starting hkex-settlement server on port {}", port);
    println!("📁 Data directory: {}", settings.data_dir.display());
    println!("🌐 Settlement source: {}", settings.hkex_base_url);

    let pipeline = Arc::new(open_pipeline(settings).await);

    let health = pipeline.health().await;
    println!(
        "🏥 Stores: cache={} timeseries={} documents={}",
        health.cache.as_str(),
        health.timeseries.as_str(),
        health.documents.as_str()
    );

    let result = server::serve(AppState::new(pipeline.clone()), port).await;
    pipeline.close().await;

    if let Err(e) = result {
        eprintln!("❌ Server error: {}", e);
        std::process::exit(1);
    }
}
