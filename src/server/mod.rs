pub mod api;

use crate::error::Result;
use crate::services::SharedPipeline;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SharedPipeline,
}

impl AppState {
    pub fn new(pipeline: SharedPipeline) -> Self {
        Self { pipeline }
    }
}

/// Build the API router
pub fn router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/", get(api::root_handler))
        .route("/health", get(api::health_handler))
        .route("/download", post(api::start_download_handler))
        .route("/download/{trading_date}", get(api::download_handler))
        .route("/data/{trading_date}", get(api::data_handler))
        .route("/search", post(api::search_handler))
        .route("/search/{symbol}/{trading_date}", get(api::search_by_date_handler))
        .route("/trading-dates", get(api::trading_dates_handler))
        .route("/symbols/{trading_date}", get(api::symbols_handler))
        .route("/history/{symbol}", get(api::history_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the axum server
pub async fn serve(app_state: AppState, port: u16) -> Result<()> {
    tracing::info!("Registering routes:");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /download, GET /download/{{trading_date}}");
    tracing::info!("  GET  /data/{{trading_date}}");
    tracing::info!("  POST /search, GET /search/{{symbol}}/{{trading_date}}");
    tracing::info!("  GET  /trading-dates, GET /symbols/{{trading_date}}");
    tracing::info!("  GET  /history/{{symbol}}?start_date=&end_date=");

    let app = router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
