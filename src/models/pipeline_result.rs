use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Status reported to CLI and API callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    /// Accepted for background processing, no result yet
    Processing,
}

/// Uniform summary of a download-and-parse run
///
/// Every failure inside the pipeline ends up here as `status = error`; nothing
/// propagates past the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub trading_date: NaiveDate,
    pub status: RunStatus,
    pub message: String,
    pub records_count: u64,
    /// Data rows discarded by the normalizer
    pub dropped_rows: u64,
    pub download_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeseries_ok: Option<bool>,
}

impl PipelineResult {
    pub fn error(trading_date: NaiveDate, message: impl Into<String>) -> Self {
        Self {
            trading_date,
            status: RunStatus::Error,
            message: message.into(),
            records_count: 0,
            dropped_rows: 0,
            download_timestamp: Utc::now(),
            documents_ok: None,
            timeseries_ok: None,
        }
    }

    pub fn processing(trading_date: NaiveDate) -> Self {
        Self {
            trading_date,
            status: RunStatus::Processing,
            message: "Download started in background".to_string(),
            records_count: 0,
            dropped_rows: 0,
            download_timestamp: Utc::now(),
            documents_ok: None,
            timeseries_ok: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
