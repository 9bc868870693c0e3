use crate::constants::cache::DOCUMENT_TTL_SECS;
use crate::error::{AppError, Result};
use crate::storage::CacheNamespace;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// `sp{DDMMYY}.dat` for a trading date
pub fn settlement_filename(trading_date: NaiveDate) -> String {
    format!("sp{}.dat", trading_date.format("%d%m%y"))
}

/// `{base_url}/sp{DDMMYY}.dat`
pub fn settlement_url(base_url: &str, trading_date: NaiveDate) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), settlement_filename(trading_date))
}

/// Source of raw settlement documents
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Download `url` as text. Any network error or non-success status is `FetchFailed`.
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub type SharedFetcher = Arc<dyn DocumentFetcher>;

/// HTTP fetcher with a fixed per-request timeout
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Sending request to: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            let error_msg = format!("Request failed: {} (url: {})", e, url);
            error!("{}", error_msg);
            AppError::FetchFailed(error_msg)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_msg = format!("HTTP {} from {}", status, url);
            error!("{}", error_msg);
            return Err(AppError::FetchFailed(error_msg));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::FetchFailed(format!("Failed to read response body: {} (url: {})", e, url)))
    }
}

/// Fetch-or-cache gate for settlement documents
///
/// A cached copy is trusted as-is; only a miss touches the network. A
/// successful download is cached for an hour and written to `data_dir` for
/// inspection. A failed download caches nothing.
#[derive(Clone)]
pub struct FetchGate {
    fetcher: SharedFetcher,
    documents: CacheNamespace,
    base_url: String,
    data_dir: PathBuf,
}

impl FetchGate {
    pub fn new(fetcher: SharedFetcher, documents: CacheNamespace, base_url: String, data_dir: PathBuf) -> Self {
        Self {
            fetcher,
            documents,
            base_url,
            data_dir,
        }
    }

    /// Cache key for a trading date's raw document
    pub fn cache_key(trading_date: NaiveDate) -> String {
        format!("settlement_file:{}", trading_date.format("%Y-%m-%d"))
    }

    pub fn url_for(&self, trading_date: NaiveDate) -> String {
        settlement_url(&self.base_url, trading_date)
    }

    pub fn local_path_for(&self, trading_date: NaiveDate) -> PathBuf {
        self.data_dir.join(settlement_filename(trading_date))
    }

    /// Raw text for `trading_date`, from cache or network
    pub async fn fetch_document(&self, trading_date: NaiveDate) -> Result<String> {
        let cache_key = Self::cache_key(trading_date);

        match self.documents.get::<String>(&cache_key).await {
            Ok(Some(cached)) if !cached.is_empty() => {
                info!(trading_date = %trading_date, "Using cached settlement file");
                return Ok(cached);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(trading_date = %trading_date, error = %e, "Cache lookup failed, fetching from network");
            }
        }

        let url = self.url_for(trading_date);
        info!(trading_date = %trading_date, url = %url, "Downloading settlement file");
        let text = self.fetcher.fetch(&url).await?;

        if let Err(e) = self
            .documents
            .set_with_ttl(&cache_key, &text, Some(Duration::from_secs(DOCUMENT_TTL_SECS)))
            .await
        {
            warn!(trading_date = %trading_date, error = %e, "Failed to cache settlement file");
        }

        let path = self.local_path_for(trading_date);
        if let Err(e) = self.persist(&path, &text).await {
            warn!(path = %path.display(), error = %e, "Failed to save settlement file");
        }

        info!(
            trading_date = %trading_date,
            bytes = text.len(),
            "Successfully downloaded {}",
            settlement_filename(trading_date)
        );
        Ok(text)
    }

    async fn persist(&self, path: &Path, text: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::write(path, text).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{CacheStore, MemoryCacheStore, SharedCacheStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Fetcher that returns a canned body (or failure) and counts calls
    pub(crate) struct StubFetcher {
        body: Option<String>,
        pub calls: AtomicUsize,
    }

    impl StubFetcher {
        pub(crate) fn ok(body: &str) -> Self {
            Self {
                body: Some(body.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                body: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.body {
                Some(body) => Ok(body.clone()),
                None => Err(AppError::FetchFailed(format!("HTTP 404 Not Found from {}", url))),
            }
        }
    }

    fn gate(fetcher: Arc<StubFetcher>, store: SharedCacheStore, data_dir: PathBuf) -> FetchGate {
        FetchGate::new(
            fetcher,
            CacheNamespace::new(store, "doc:", None),
            "https://example.test/datadownload/".to_string(),
            data_dir,
        )
    }

    fn aug22() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 8, 22).unwrap()
    }

    #[test]
    fn test_settlement_filename() {
        assert_eq!(settlement_filename(aug22()), "sp220823.dat");
        assert_eq!(
            settlement_filename(NaiveDate::from_ymd_opt(2025, 1, 3).unwrap()),
            "sp030125.dat"
        );
    }

    #[test]
    fn test_settlement_url() {
        assert_eq!(
            settlement_url("https://hkex.com/hk/eng/stat/dmstat/datadownload", aug22()),
            "https://hkex.com/hk/eng/stat/dmstat/datadownload/sp220823.dat"
        );
        assert_eq!(
            settlement_url("https://example.test/", aug22()),
            "https://example.test/sp220823.dat"
        );
    }

    #[tokio::test]
    async fn test_cache_miss_fetches_caches_and_saves() {
        let temp_dir = tempdir().unwrap();
        let store: SharedCacheStore = Arc::new(MemoryCacheStore::new());
        let fetcher = Arc::new(StubFetcher::ok("Series ...\n"));
        let gate = gate(fetcher.clone(), store.clone(), temp_dir.path().to_path_buf());

        let text = gate.fetch_document(aug22()).await.unwrap();
        assert_eq!(text, "Series ...\n");
        assert_eq!(fetcher.call_count(), 1);

        let cached = store.get("doc:settlement_file:2023-08-22").await.unwrap();
        assert_eq!(cached, Some(serde_json::json!("Series ...\n")));

        let saved = std::fs::read_to_string(temp_dir.path().join("sp220823.dat")).unwrap();
        assert_eq!(saved, "Series ...\n");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let temp_dir = tempdir().unwrap();
        let store: SharedCacheStore = Arc::new(MemoryCacheStore::new());
        store
            .set("doc:settlement_file:2023-08-22", serde_json::json!("cached body"), None)
            .await
            .unwrap();
        let fetcher = Arc::new(StubFetcher::ok("network body"));
        let gate = gate(fetcher.clone(), store, temp_dir.path().to_path_buf());

        let text = gate.fetch_document(aug22()).await.unwrap();
        assert_eq!(text, "cached body");
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_cached_value_is_a_miss() {
        let temp_dir = tempdir().unwrap();
        let store: SharedCacheStore = Arc::new(MemoryCacheStore::new());
        store
            .set("doc:settlement_file:2023-08-22", serde_json::json!(""), None)
            .await
            .unwrap();
        let fetcher = Arc::new(StubFetcher::ok("network body"));
        let gate = gate(fetcher.clone(), store, temp_dir.path().to_path_buf());

        assert_eq!(gate.fetch_document(aug22()).await.unwrap(), "network body");
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_caches_nothing() {
        let temp_dir = tempdir().unwrap();
        let store: SharedCacheStore = Arc::new(MemoryCacheStore::new());
        let fetcher = Arc::new(StubFetcher::failing());
        let gate = gate(fetcher.clone(), store.clone(), temp_dir.path().to_path_buf());

        let result = gate.fetch_document(aug22()).await;
        assert!(matches!(result, Err(AppError::FetchFailed(_))));
        assert_eq!(store.get("doc:settlement_file:2023-08-22").await.unwrap(), None);
        assert!(!temp_dir.path().join("sp220823.dat").exists());
    }
}
