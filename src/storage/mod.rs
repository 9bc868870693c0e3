//! Storage collaborators
//!
//! Each backend sits behind an object-safe async trait so the pipeline can be
//! handed whatever implementation the process (or a test) constructs. There
//! are no global clients: [`Stores::connect`] builds the handles from
//! [`Settings`] and [`Stores::close`] releases them.
//!
//! The wrappers are deliberately thin. Writes are independent; nothing here
//! coordinates a transaction across stores.

pub mod cache_store;
pub mod document_store;
pub mod timeseries_store;

pub use cache_store::{CacheNamespace, MemoryCacheStore, SqliteCacheStore};
pub use document_store::SqliteDocumentStore;
pub use timeseries_store::{CsvTimeSeriesStore, TimeSeriesPoint};

use crate::config::{CacheBackend, Settings};
use crate::error::Result;
use crate::models::{SettlementRecord, StoredSettlementRecord, TradingDateSummary};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Key-value cache with optional per-entry expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name used in logs and health output
    fn name(&self) -> &'static str;

    /// Value for `key`, or `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`; `ttl = None` never expires
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Remove `key`, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every key starting with `prefix`, returning how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self);
}

/// Row store for settlement records and the trading date index
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Upsert `records` for `trading_date` and mark the date completed.
    ///
    /// Rows are keyed on (trading_date, series, expiry, strike, call_put), so a
    /// re-run overwrites instead of duplicating.
    async fn insert(&self, trading_date: NaiveDate, records: &[SettlementRecord]) -> Result<usize>;

    /// Records for a date, optionally restricted to series starting with `symbol_prefix`
    async fn query(
        &self,
        trading_date: NaiveDate,
        symbol_prefix: Option<&str>,
    ) -> Result<Vec<StoredSettlementRecord>>;

    /// All processed dates, newest first
    async fn list_dates(&self) -> Result<Vec<TradingDateSummary>>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self);
}

/// Append-by-date time series of settlement points
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Write one point per record, timestamped with `trading_date`.
    /// Writing the same date again replaces that date's points.
    async fn write(&self, trading_date: NaiveDate, records: &[SettlementRecord]) -> Result<usize>;

    /// Points for exactly `series` between `start` and `end` inclusive, oldest first
    async fn query(&self, series: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<TimeSeriesPoint>>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self);
}

pub type SharedCacheStore = Arc<dyn CacheStore>;
pub type SharedDocumentStore = Arc<dyn DocumentStore>;
pub type SharedTimeSeriesStore = Arc<dyn TimeSeriesStore>;

/// The three collaborators the pipeline fans out to
#[derive(Clone)]
pub struct Stores {
    pub cache: SharedCacheStore,
    pub documents: SharedDocumentStore,
    pub timeseries: SharedTimeSeriesStore,
}

/// Connection state of a single store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        *self == ConnectionState::Connected
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

/// Per-store health snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreHealth {
    pub cache: ConnectionState,
    pub timeseries: ConnectionState,
    pub documents: ConnectionState,
}

impl StoreHealth {
    pub fn all_connected(&self) -> bool {
        self.cache.is_connected() && self.timeseries.is_connected() && self.documents.is_connected()
    }
}

fn connection_state(store: &str, result: Result<()>) -> ConnectionState {
    match result {
        Ok(()) => ConnectionState::Connected,
        Err(e) => {
            warn!(store, error = %e, "Health check failed");
            ConnectionState::Disconnected
        }
    }
}

impl Stores {
    /// Open every backend configured in `settings`
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let cache: SharedCacheStore = match settings.cache_backend {
            CacheBackend::Sqlite => Arc::new(SqliteCacheStore::new(settings.cache_db_path.clone()).await?),
            CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
        };
        let documents: SharedDocumentStore =
            Arc::new(SqliteDocumentStore::new(settings.document_db_path.clone()).await?);
        let timeseries: SharedTimeSeriesStore =
            Arc::new(CsvTimeSeriesStore::new(settings.timeseries_dir.clone()).await?);

        info!(
            cache = cache.name(),
            documents = documents.name(),
            timeseries = timeseries.name(),
            "Storage backends connected"
        );

        Ok(Self {
            cache,
            documents,
            timeseries,
        })
    }

    /// Ping all three stores
    pub async fn health(&self) -> StoreHealth {
        StoreHealth {
            cache: connection_state(self.cache.name(), self.cache.ping().await),
            timeseries: connection_state(self.timeseries.name(), self.timeseries.ping().await),
            documents: connection_state(self.documents.name(), self.documents.ping().await),
        }
    }

    pub async fn close(&self) {
        self.cache.close().await;
        self.timeseries.close().await;
        self.documents.close().await;
        info!("Storage backends closed");
    }
}
