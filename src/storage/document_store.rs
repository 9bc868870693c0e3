use super::DocumentStore;
use crate::error::{AppError, Result};
use crate::models::{OptionType, SettlementRecord, StoredSettlementRecord, SummaryStatus, TradingDateSummary};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqliteRow, Row, SqlitePool};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite document store for settlement records and the trading date index
#[derive(Debug)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub async fn new(database_path: PathBuf) -> Result<Self> {
        info!("Initializing SQLite document store at: {:?}", database_path);

        // Ensure parent directory exists
        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)  // Concurrent reads while the pipeline writes
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))  // Wait 30s for locked DB
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(connect_options).await?;

        let store = Self { pool };
        store.initialize_database().await?;

        info!("SQLite document store initialized successfully");
        Ok(store)
    }

    async fn initialize_database(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settlement_records (
                trading_date TEXT NOT NULL,
                series TEXT NOT NULL,
                expiry TEXT NOT NULL,
                strike REAL NOT NULL,
                call_put TEXT NOT NULL,
                settlement_price REAL NOT NULL,
                volume INTEGER NOT NULL,
                open_interest INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (trading_date, series, expiry, strike, call_put)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trading_dates (
                trading_date TEXT PRIMARY KEY,
                total_records INTEGER NOT NULL,
                download_timestamp TEXT NOT NULL,
                status TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Symbol search filters on series within a date
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_settlement_records_series ON settlement_records(trading_date, series)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_record(row: SqliteRow) -> Result<StoredSettlementRecord> {
        let trading_date: String = row.try_get("trading_date")?;
        let call_put: String = row.try_get("call_put")?;
        let created_at: String = row.try_get("created_at")?;
        let volume: i64 = row.try_get("volume")?;
        let open_interest: i64 = row.try_get("open_interest")?;

        Ok(StoredSettlementRecord {
            trading_date: parse_stored_date(&trading_date)?,
            record: SettlementRecord {
                series: row.try_get("series")?,
                expiry: row.try_get("expiry")?,
                strike: row.try_get("strike")?,
                call_put: call_put.parse::<OptionType>().map_err(AppError::Database)?,
                settlement_price: row.try_get("settlement_price")?,
                volume: stored_count(volume, "volume")?,
                open_interest: stored_count(open_interest, "open_interest")?,
            },
            created_at: parse_stored_timestamp(&created_at)?,
        })
    }

    fn row_to_summary(row: SqliteRow) -> Result<TradingDateSummary> {
        let trading_date: String = row.try_get("trading_date")?;
        let total_records: i64 = row.try_get("total_records")?;
        let download_timestamp: String = row.try_get("download_timestamp")?;
        let status: String = row.try_get("status")?;

        Ok(TradingDateSummary {
            trading_date: parse_stored_date(&trading_date)?,
            total_records: stored_count(total_records, "total_records")?,
            download_timestamp: parse_stored_timestamp(&download_timestamp)?,
            status: status.parse::<SummaryStatus>().map_err(AppError::Database)?,
        })
    }
}

fn stored_count(value: i64, name: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| AppError::Database(format!("Negative stored {}: {}", name, value)))
}

/// Counts are stored as SQLite INTEGER (i64)
fn column_count(value: u64, name: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| AppError::InvalidInput(format!("{} {} exceeds the storable range", name, value)))
}

fn parse_stored_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| AppError::Database(format!("Bad stored date '{}': {}", value, e)))
}

fn parse_stored_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("Bad stored timestamp '{}': {}", value, e)))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn name(&self) -> &'static str {
        "sqlite-documents"
    }

    async fn insert(&self, trading_date: NaiveDate, records: &[SettlementRecord]) -> Result<usize> {
        let date = trading_date.format(DATE_FORMAT).to_string();
        let now = Utc::now().to_rfc3339();

        let mut transaction = self.pool.begin().await?;
        let mut affected_rows = 0;

        for record in records {
            let volume = column_count(record.volume, "volume")?;
            let open_interest = column_count(record.open_interest, "open_interest")?;
            let result = sqlx::query(
                r#"
                INSERT INTO settlement_records (
                    trading_date, series, expiry, strike, call_put,
                    settlement_price, volume, open_interest, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(trading_date, series, expiry, strike, call_put) DO UPDATE SET
                    settlement_price = excluded.settlement_price,
                    volume = excluded.volume,
                    open_interest = excluded.open_interest,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&date)
            .bind(&record.series)
            .bind(&record.expiry)
            .bind(record.strike)
            .bind(record.call_put.as_str())
            .bind(record.settlement_price)
            .bind(volume)
            .bind(open_interest)
            .bind(&now)
            .execute(&mut *transaction)
            .await?;

            affected_rows += result.rows_affected() as usize;
        }

        sqlx::query(
            r#"
            INSERT INTO trading_dates (trading_date, total_records, download_timestamp, status)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(trading_date) DO UPDATE SET
                total_records = excluded.total_records,
                download_timestamp = excluded.download_timestamp,
                status = excluded.status
            "#,
        )
        .bind(&date)
        .bind(records.len() as i64)
        .bind(&now)
        .bind(SummaryStatus::Completed.as_str())
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;

        info!(trading_date = %date, records = affected_rows, "Inserted settlement records");
        Ok(affected_rows)
    }

    async fn query(
        &self,
        trading_date: NaiveDate,
        symbol_prefix: Option<&str>,
    ) -> Result<Vec<StoredSettlementRecord>> {
        let date = trading_date.format(DATE_FORMAT).to_string();

        let rows = match symbol_prefix.filter(|prefix| !prefix.is_empty()) {
            Some(prefix) => {
                sqlx::query(
                    r#"
                    SELECT * FROM settlement_records
                    WHERE trading_date = ?1 AND substr(series, 1, length(?2)) = ?2
                    ORDER BY series, expiry, strike, call_put
                    "#,
                )
                .bind(&date)
                .bind(prefix)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM settlement_records
                    WHERE trading_date = ?1
                    ORDER BY series, expiry, strike, call_put
                    "#,
                )
                .bind(&date)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn list_dates(&self) -> Result<Vec<TradingDateSummary>> {
        let rows = sqlx::query("SELECT * FROM trading_dates ORDER BY trading_date DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_summary).collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
