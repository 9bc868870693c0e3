use crate::error::AppError;
use crate::models::PipelineResult;
use crate::server::AppState;
use crate::utils::parse_date;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Query;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, instrument};

/// Body of `POST /download`
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    /// Trading date (YYYY-MM-DD)
    pub trading_date: String,
}

/// Body of `POST /search`
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Series prefix, e.g. `HTI` or `HTI2308`
    pub symbol: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Query parameters for /history/{symbol}
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// 400 for bad input, 500 for everything else
fn error_response(err: AppError) -> Response {
    let status = match err {
        AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        debug!("Rejected request: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn parse_optional_date(input: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    input.map(parse_date).transpose()
}

/// GET / - service name and version
pub async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "HKEX Settlement Price Parser API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health - per-store connection state
#[instrument(skip(app_state))]
pub async fn health_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    let health = app_state.pipeline.health().await;
    let status = if health.all_connected() { "healthy" } else { "degraded" };

    (
        StatusCode::OK,
        Json(json!({
            "status": status,
            "cache": health.cache.as_str(),
            "timeseries": health.timeseries.as_str(),
            "documents": health.documents.as_str(),
            "timestamp": Utc::now(),
        })),
    )
        .into_response()
}

/// POST /download - start a pipeline run in the background
#[instrument(skip(app_state))]
pub async fn start_download_handler(
    State(app_state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Response {
    let trading_date = match parse_date(&request.trading_date) {
        Ok(date) => date,
        Err(e) => return error_response(e),
    };

    let pipeline = app_state.pipeline.clone();
    tokio::spawn(async move {
        let result = pipeline.download_and_parse(trading_date).await;
        info!(
            trading_date = %trading_date,
            status = ?result.status,
            records = result.records_count,
            "Background download finished"
        );
    });

    (StatusCode::OK, Json(PipelineResult::processing(trading_date))).into_response()
}

/// GET /download/{trading_date} - run the pipeline and wait for the result
///
/// Pipeline failures still answer 200; the body carries `status = error`.
#[instrument(skip(app_state))]
pub async fn download_handler(
    State(app_state): State<AppState>,
    Path(trading_date): Path<String>,
) -> Response {
    let trading_date = match parse_date(&trading_date) {
        Ok(date) => date,
        Err(e) => return error_response(e),
    };

    let result = app_state.pipeline.download_and_parse(trading_date).await;
    (StatusCode::OK, Json(result)).into_response()
}

/// GET /data/{trading_date} - every stored record for a date
#[instrument(skip(app_state))]
pub async fn data_handler(
    State(app_state): State<AppState>,
    Path(trading_date): Path<String>,
) -> Response {
    let trading_date = match parse_date(&trading_date) {
        Ok(date) => date,
        Err(e) => return error_response(e),
    };

    match app_state.pipeline.get_records(trading_date).await {
        Ok(records) => (
            StatusCode::OK,
            Json(json!({
                "trading_date": trading_date,
                "total_records": records.len(),
                "records": records,
                "download_timestamp": Utc::now(),
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /search - date range search, or the latest trading date when no range is given
///
/// Examples:
/// - {"symbol": "HTI"}
/// - {"symbol": "HTI", "start_date": "2023-08-01", "end_date": "2023-08-31"}
#[instrument(skip(app_state))]
pub async fn search_handler(
    State(app_state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    let range = match (
        parse_optional_date(request.start_date.as_deref()),
        parse_optional_date(request.end_date.as_deref()),
    ) {
        (Ok(Some(start)), Ok(Some(end))) => Some((start, end)),
        (Ok(None), Ok(None)) => None,
        (Ok(_), Ok(_)) => {
            return error_response(AppError::InvalidInput(
                "start_date and end_date must be provided together".to_string(),
            ))
        }
        (Err(e), _) | (_, Err(e)) => return error_response(e),
    };

    let pipeline = &app_state.pipeline;
    match range {
        Some((start, end)) => match pipeline.search_symbol_range(&request.symbol, start, end).await {
            Ok(records) => (
                StatusCode::OK,
                Json(json!({ "symbol": request.symbol, "records": records })),
            )
                .into_response(),
            Err(e) => error_response(e),
        },
        None => {
            let (trading_date, records) = match pipeline.search_latest(&request.symbol).await {
                Some((date, records)) => (Some(date), records),
                None => (None, Vec::new()),
            };
            (
                StatusCode::OK,
                Json(json!({
                    "symbol": request.symbol,
                    "trading_date": trading_date,
                    "records": records,
                })),
            )
                .into_response()
        }
    }
}

/// GET /search/{symbol}/{trading_date}
#[instrument(skip(app_state))]
pub async fn search_by_date_handler(
    State(app_state): State<AppState>,
    Path((symbol, trading_date)): Path<(String, String)>,
) -> Response {
    let trading_date = match parse_date(&trading_date) {
        Ok(date) => date,
        Err(e) => return error_response(e),
    };

    let records = app_state.pipeline.search_symbol(&symbol, trading_date).await;
    (
        StatusCode::OK,
        Json(json!({
            "symbol": symbol,
            "trading_date": trading_date,
            "records": records,
        })),
    )
        .into_response()
}

/// GET /trading-dates - processed dates, newest first
#[instrument(skip(app_state))]
pub async fn trading_dates_handler(State(app_state): State<AppState>) -> Response {
    let dates = app_state.pipeline.get_trading_dates().await;
    (StatusCode::OK, Json(json!({ "trading_dates": dates }))).into_response()
}

/// GET /symbols/{trading_date} - distinct series for a date
#[instrument(skip(app_state))]
pub async fn symbols_handler(
    State(app_state): State<AppState>,
    Path(trading_date): Path<String>,
) -> Response {
    let trading_date = match parse_date(&trading_date) {
        Ok(date) => date,
        Err(e) => return error_response(e),
    };

    match app_state.pipeline.symbols_for_date(trading_date).await {
        Ok(symbols) => (
            StatusCode::OK,
            Json(json!({ "trading_date": trading_date, "symbols": symbols })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /history/{symbol}?start_date=2023-08-01&end_date=2023-08-31
///
/// Without dates: the last 30 days ending today.
#[instrument(skip(app_state))]
pub async fn history_handler(
    State(app_state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Response {
    let (start, end) = match (
        parse_optional_date(params.start_date.as_deref()),
        parse_optional_date(params.end_date.as_deref()),
    ) {
        (Ok(start), Ok(end)) => (start, end),
        (Err(e), _) | (_, Err(e)) => return error_response(e),
    };

    match app_state.pipeline.series_history(&symbol, start, end).await {
        Ok(points) => (
            StatusCode::OK,
            Json(json!({
                "symbol": symbol,
                "total_points": points.len(),
                "points": points,
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
