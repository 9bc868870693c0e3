//! Settlement pipeline orchestrator
//!
//! `download_and_parse` drives fetch-or-cache → header → tokenize → normalize
//! → fan-out, and always answers with a [`PipelineResult`]. The query helpers
//! sit on the same collaborators and use the query cache namespace.

use crate::config::Settings;
use crate::constants::cache::{
    CONFIG_PREFIX, DOCUMENT_PREFIX, DOCUMENT_TTL_SECS, QUERY_PREFIX, SYMBOL_SEARCH_TTL_SECS,
    TRADING_DATES_KEY, TRADING_DATES_TTL_SECS,
};
use crate::constants::{DEFAULT_HISTORY_DAYS, MAX_SEARCH_RANGE_DAYS};
use crate::error::{AppError, Result};
use crate::models::{
    PipelineResult, RunMetadata, RunStatus, StoredSettlementRecord, SummaryStatus, TradingDateSummary,
};
use crate::services::file_fetcher::{FetchGate, HttpFetcher, SharedFetcher};
use crate::services::settlement_parser::parse_document;
use crate::storage::{CacheNamespace, StoreHealth, Stores, TimeSeriesPoint};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub type SharedPipeline = Arc<SettlementPipeline>;

pub struct SettlementPipeline {
    gate: FetchGate,
    stores: Stores,
    /// Symbol searches and the trading date list
    queries: CacheNamespace,
    /// Per-date run metadata, no expiry
    config: CacheNamespace,
}

impl SettlementPipeline {
    pub fn new(stores: Stores, fetcher: SharedFetcher, settings: &Settings) -> Self {
        let documents = CacheNamespace::new(
            stores.cache.clone(),
            DOCUMENT_PREFIX,
            Some(Duration::from_secs(DOCUMENT_TTL_SECS)),
        );
        let gate = FetchGate::new(
            fetcher,
            documents,
            settings.hkex_base_url.clone(),
            settings.data_dir.clone(),
        );

        Self {
            gate,
            queries: CacheNamespace::new(
                stores.cache.clone(),
                QUERY_PREFIX,
                Some(Duration::from_secs(SYMBOL_SEARCH_TTL_SECS)),
            ),
            config: CacheNamespace::new(stores.cache.clone(), CONFIG_PREFIX, None),
            stores,
        }
    }

    /// Connect every store and build the HTTP fetcher from `settings`
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let stores = Stores::connect(settings).await?;
        let fetcher: SharedFetcher = Arc::new(HttpFetcher::new(settings.fetch_timeout)?);
        Ok(Self::new(stores, fetcher, settings))
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    fn metadata_key(trading_date: NaiveDate) -> String {
        format!("settlement_metadata:{}", trading_date.format("%Y-%m-%d"))
    }

    fn symbol_search_key(trading_date: NaiveDate, symbol: &str) -> String {
        format!("symbol_search:{}:{}", trading_date.format("%Y-%m-%d"), symbol)
    }

    /// Download, parse and store settlement data for `trading_date`.
    ///
    /// Never fails: every error is folded into a `status = error` result.
    #[instrument(skip(self), fields(trading_date = %trading_date))]
    pub async fn download_and_parse(&self, trading_date: NaiveDate) -> PipelineResult {
        let text = match self.gate.fetch_document(trading_date).await {
            Ok(text) => text,
            Err(e) => {
                let message = format!("Failed to download file for {}: {}", trading_date, e);
                return self.fail(trading_date, message, 0).await;
            }
        };

        let parsed = match parse_document(&text) {
            Ok(parsed) => parsed,
            Err(e @ AppError::HeaderNotFound) => {
                let message = format!("{} for {}", e, trading_date);
                return self.fail(trading_date, message, 0).await;
            }
            Err(e) => {
                let message = format!("Failed to parse settlement file for {}: {}", trading_date, e);
                return self.fail(trading_date, message, 0).await;
            }
        };

        let dropped_rows = parsed.dropped_rows as u64;
        if dropped_rows > 0 {
            warn!(dropped_rows, "Skipped invalid rows in settlement file");
        }

        if parsed.records.is_empty() {
            let message = format!("{} for {}", AppError::NoValidRecords, trading_date);
            return self.fail(trading_date, message, dropped_rows).await;
        }

        let records = parsed.records;
        let records_count = records.len() as u64;
        info!(records = records_count, "Parsed settlement records");

        // Independent writes: one store failing does not stop or undo the other
        let documents_ok = match self.stores.documents.insert(trading_date, &records).await {
            Ok(_) => true,
            Err(e) => {
                let err = AppError::StorageWriteFailed {
                    store: self.stores.documents.name().to_string(),
                    message: e.to_string(),
                };
                error!(error = %err, "Document store write failed");
                false
            }
        };

        let timeseries_ok = match self.stores.timeseries.write(trading_date, &records).await {
            Ok(_) => true,
            Err(e) => {
                let err = AppError::StorageWriteFailed {
                    store: self.stores.timeseries.name().to_string(),
                    message: e.to_string(),
                };
                error!(error = %err, "Time-series store write failed");
                false
            }
        };

        let download_timestamp = Utc::now();
        let metadata = RunMetadata {
            trading_date,
            total_records: records_count,
            dropped_rows,
            download_timestamp,
            status: SummaryStatus::Completed,
            message: String::new(),
            documents_ok: Some(documents_ok),
            timeseries_ok: Some(timeseries_ok),
        };
        self.save_metadata(&metadata).await;
        self.invalidate_queries(trading_date).await;

        info!(records = records_count, documents_ok, timeseries_ok, "Settlement data processed");

        PipelineResult {
            trading_date,
            status: RunStatus::Success,
            message: format!("Successfully processed {} records for {}", records_count, trading_date),
            records_count,
            dropped_rows,
            download_timestamp,
            documents_ok: Some(documents_ok),
            timeseries_ok: Some(timeseries_ok),
        }
    }

    async fn fail(&self, trading_date: NaiveDate, message: String, dropped_rows: u64) -> PipelineResult {
        error!(trading_date = %trading_date, "{}", message);

        let mut result = PipelineResult::error(trading_date, message);
        result.dropped_rows = dropped_rows;

        let metadata = RunMetadata {
            trading_date,
            total_records: 0,
            dropped_rows,
            download_timestamp: result.download_timestamp,
            status: SummaryStatus::Error,
            message: result.message.clone(),
            documents_ok: None,
            timeseries_ok: None,
        };
        self.save_metadata(&metadata).await;

        result
    }

    async fn save_metadata(&self, metadata: &RunMetadata) {
        let key = Self::metadata_key(metadata.trading_date);
        if let Err(e) = self.config.set(&key, metadata).await {
            warn!(key = %key, error = %e, "Failed to store run metadata");
        }
    }

    /// Drop cached query results that a new run for `trading_date` makes stale
    async fn invalidate_queries(&self, trading_date: NaiveDate) {
        if let Err(e) = self.queries.delete(TRADING_DATES_KEY).await {
            warn!(error = %e, "Failed to invalidate trading dates cache");
        }
        let prefix = format!("symbol_search:{}:", trading_date.format("%Y-%m-%d"));
        match self.queries.delete_prefix(&prefix).await {
            Ok(removed) => debug!(removed, "Invalidated cached symbol searches"),
            Err(e) => warn!(error = %e, "Failed to invalidate symbol search cache"),
        }
    }

    /// Metadata recorded by the most recent run for `trading_date`
    pub async fn last_run(&self, trading_date: NaiveDate) -> Result<Option<RunMetadata>> {
        self.config.get(&Self::metadata_key(trading_date)).await
    }

    /// Records on `trading_date` whose series starts with `symbol`.
    ///
    /// Served from the query cache when possible. Store errors are logged and
    /// yield an empty list.
    #[instrument(skip(self))]
    pub async fn search_symbol(&self, symbol: &str, trading_date: NaiveDate) -> Vec<StoredSettlementRecord> {
        let cache_key = Self::symbol_search_key(trading_date, symbol);

        match self.queries.get::<Vec<StoredSettlementRecord>>(&cache_key).await {
            Ok(Some(cached)) => {
                debug!(records = cached.len(), "Symbol search served from cache");
                return cached;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Query cache lookup failed"),
        }

        let records = match self.stores.documents.query(trading_date, Some(symbol)).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Error searching for symbol {}", symbol);
                return Vec::new();
            }
        };

        if !records.is_empty() {
            if let Err(e) = self.queries.set(&cache_key, &records).await {
                warn!(error = %e, "Failed to cache symbol search");
            }
        }

        records
    }

    /// Search every calendar day from `start` to `end` inclusive
    pub async fn search_symbol_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StoredSettlementRecord>> {
        if start > end {
            return Err(AppError::InvalidInput(format!(
                "start_date {} is after end_date {}",
                start, end
            )));
        }
        let days = (end - start).num_days() + 1;
        if days > MAX_SEARCH_RANGE_DAYS {
            return Err(AppError::InvalidInput(format!(
                "Date range of {} days exceeds the {} day limit",
                days, MAX_SEARCH_RANGE_DAYS
            )));
        }

        let mut results = Vec::new();
        for day in start.iter_days().take(days as usize) {
            results.extend(self.search_symbol(symbol, day).await);
        }
        Ok(results)
    }

    /// Search the most recent trading date; `None` when no dates are stored
    pub async fn search_latest(&self, symbol: &str) -> Option<(NaiveDate, Vec<StoredSettlementRecord>)> {
        let latest = self.get_trading_dates().await.first()?.trading_date;
        Some((latest, self.search_symbol(symbol, latest).await))
    }

    /// Processed trading dates, newest first (cached)
    pub async fn get_trading_dates(&self) -> Vec<TradingDateSummary> {
        match self.queries.get::<Vec<TradingDateSummary>>(TRADING_DATES_KEY).await {
            Ok(Some(cached)) => return cached,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Query cache lookup failed"),
        }

        let dates = match self.stores.documents.list_dates().await {
            Ok(dates) => dates,
            Err(e) => {
                error!(error = %e, "Error getting trading dates");
                return Vec::new();
            }
        };

        if !dates.is_empty() {
            let ttl = Some(Duration::from_secs(TRADING_DATES_TTL_SECS));
            if let Err(e) = self.queries.set_with_ttl(TRADING_DATES_KEY, &dates, ttl).await {
                warn!(error = %e, "Failed to cache trading dates");
            }
        }

        dates
    }

    /// Every stored record for `trading_date`
    pub async fn get_records(&self, trading_date: NaiveDate) -> Result<Vec<StoredSettlementRecord>> {
        self.stores.documents.query(trading_date, None).await
    }

    /// Distinct series stored for `trading_date`, sorted
    pub async fn symbols_for_date(&self, trading_date: NaiveDate) -> Result<Vec<String>> {
        let records = self.get_records(trading_date).await?;
        let symbols: BTreeSet<String> = records.into_iter().map(|r| r.record.series).collect();
        Ok(symbols.into_iter().collect())
    }

    /// Time series for one exact series.
    ///
    /// `end` defaults to today and `start` to the 30-day window ending at `end`
    /// (both bounds inclusive).
    pub async fn series_history(
        &self,
        series: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let end = end.unwrap_or_else(|| Utc::now().date_naive());
        let start = match start {
            Some(start) => start,
            None => end
                .checked_sub_signed(ChronoDuration::days(DEFAULT_HISTORY_DAYS - 1))
                .ok_or_else(|| {
                    AppError::InvalidInput(format!("end_date {} is too early for a default window", end))
                })?,
        };
        if start > end {
            return Err(AppError::InvalidInput(format!(
                "start_date {} is after end_date {}",
                start, end
            )));
        }
        self.stores.timeseries.query(series, start, end).await
    }

    pub async fn health(&self) -> StoreHealth {
        self.stores.health().await
    }

    pub async fn close(&self) {
        self.stores.close().await;
    }
}
