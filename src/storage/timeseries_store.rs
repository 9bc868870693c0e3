use super::TimeSeriesStore;
use crate::error::{AppError, Result};
use crate::models::{OptionType, SettlementRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One settlement observation in the time series
///
/// Tags: series, expiry, call_put. Fields: strike, settlement_price, volume,
/// open_interest. Timestamp: the trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time: NaiveDate,
    pub series: String,
    pub expiry: String,
    pub call_put: OptionType,
    pub strike: f64,
    pub settlement_price: f64,
    pub volume: u64,
    pub open_interest: u64,
}

impl TimeSeriesPoint {
    pub fn from_record(time: NaiveDate, record: &SettlementRecord) -> Self {
        Self {
            time,
            series: record.series.clone(),
            expiry: record.expiry.clone(),
            call_put: record.call_put,
            strike: record.strike,
            settlement_price: record.settlement_price,
            volume: record.volume,
            open_interest: record.open_interest,
        }
    }
}

/// Time-series store backed by one CSV file per trading date
///
/// Layout: `{dir}/YYYY-MM-DD.csv`. A write replaces the whole file for that
/// date (written to a temp file, then renamed).
#[derive(Debug)]
pub struct CsvTimeSeriesStore {
    dir: PathBuf,
}

impl CsvTimeSeriesStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        info!("Time-series directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn file_for(&self, trading_date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.csv", trading_date.format("%Y-%m-%d")))
    }

    /// Trading date encoded in a file name, if it is one of ours
    fn date_from_path(path: &Path) -> Option<NaiveDate> {
        if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
    }

    fn encode(points: &[TimeSeriesPoint]) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for point in points {
            writer.serialize(point)?;
        }
        writer
            .into_inner()
            .map_err(|e| AppError::Io(format!("CSV flush failed: {}", e)))
    }

    fn decode(bytes: &[u8]) -> Result<Vec<TimeSeriesPoint>> {
        let mut reader = csv::Reader::from_reader(bytes);
        let mut points = Vec::new();
        for point in reader.deserialize() {
            points.push(point?);
        }
        Ok(points)
    }
}

#[async_trait]
impl TimeSeriesStore for CsvTimeSeriesStore {
    fn name(&self) -> &'static str {
        "csv-timeseries"
    }

    async fn write(&self, trading_date: NaiveDate, records: &[SettlementRecord]) -> Result<usize> {
        let points: Vec<TimeSeriesPoint> = records
            .iter()
            .map(|record| TimeSeriesPoint::from_record(trading_date, record))
            .collect();
        let bytes = Self::encode(&points)?;

        let path = self.file_for(trading_date);
        let tmp_path = path.with_extension("csv.tmp");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        info!(trading_date = %trading_date, points = points.len(), "Written settlement points");
        Ok(points.len())
    }

    async fn query(&self, series: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<TimeSeriesPoint>> {
        let mut dated_files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(date) = Self::date_from_path(&path) {
                if date >= start && date <= end {
                    dated_files.push((date, path));
                }
            }
        }
        dated_files.sort_by_key(|(date, _)| *date);

        let mut points = Vec::new();
        for (date, path) in dated_files {
            let bytes = tokio::fs::read(&path).await?;
            let matching = Self::decode(&bytes)?
                .into_iter()
                .filter(|point| point.series == series);
            points.extend(matching);
            debug!(trading_date = %date, "Scanned time-series file");
        }

        Ok(points)
    }

    async fn ping(&self) -> Result<()> {
        let metadata = tokio::fs::metadata(&self.dir).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(AppError::Io(format!("{} is not a directory", self.dir.display())))
        }
    }

    async fn close(&self) {}
}
