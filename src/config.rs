use crate::constants::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_HKEX_BASE_URL, DEFAULT_PORT};
use crate::error::{AppError, Result};
use crate::utils::{get_data_dir, get_parsed_env, get_path_env, get_string_env};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which backend holds the cache/config namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// SQLite key-value table, survives across CLI invocations
    Sqlite,
    /// Process-local map, lost on exit
    Memory,
}

impl FromStr for CacheBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(CacheBackend::Sqlite),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(AppError::Config(format!(
                "CACHE_BACKEND must be 'sqlite' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

/// Application settings, read once from the environment at startup
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL the `spDDMMYY.dat` files are downloaded from
    pub hkex_base_url: String,
    /// Directory for downloaded files and default store locations
    pub data_dir: PathBuf,
    pub document_db_path: PathBuf,
    pub cache_backend: CacheBackend,
    pub cache_db_path: PathBuf,
    pub timeseries_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub port: u16,
    pub log_level: String,
}

impl Settings {
    /// Build settings from environment variables.
    ///
    /// | Variable             | Default                       |
    /// |----------------------|-------------------------------|
    /// | `HKEX_BASE_URL`      | HKEX data download URL        |
    /// | `DATA_DIR`           | `data`                        |
    /// | `DOCUMENT_DB_PATH`   | `{DATA_DIR}/settlement.db`    |
    /// | `CACHE_BACKEND`      | `sqlite`                      |
    /// | `CACHE_DB_PATH`      | `{DATA_DIR}/cache.db`         |
    /// | `TIMESERIES_DIR`     | `{DATA_DIR}/timeseries`       |
    /// | `FETCH_TIMEOUT_SECS` | `30`                          |
    /// | `PORT`               | `8000`                        |
    /// | `LOG_LEVEL`          | `info`                        |
    pub fn from_env() -> Result<Self> {
        let data_dir = get_data_dir();

        let hkex_base_url = get_string_env("HKEX_BASE_URL", DEFAULT_HKEX_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        if !hkex_base_url.starts_with("http://") && !hkex_base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "Invalid HKEX_BASE_URL: must start with http:// or https://, got: '{}'",
                hkex_base_url
            )));
        }

        let cache_backend = get_string_env("CACHE_BACKEND", "sqlite").parse()?;
        let fetch_timeout_secs: u64 = get_parsed_env("FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?;

        Ok(Self {
            hkex_base_url,
            document_db_path: get_path_env("DOCUMENT_DB_PATH", data_dir.join("settlement.db")),
            cache_backend,
            cache_db_path: get_path_env("CACHE_DB_PATH", data_dir.join("cache.db")),
            timeseries_dir: get_path_env("TIMESERIES_DIR", data_dir.join("timeseries")),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            port: get_parsed_env("PORT", DEFAULT_PORT)?,
            log_level: get_string_env("LOG_LEVEL", "info"),
            data_dir,
        })
    }

    /// Settings rooted at `data_dir` with defaults for everything else
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            hkex_base_url: DEFAULT_HKEX_BASE_URL.to_string(),
            document_db_path: data_dir.join("settlement.db"),
            cache_backend: CacheBackend::Sqlite,
            cache_db_path: data_dir.join("cache.db"),
            timeseries_dir: data_dir.join("timeseries"),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            data_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_backend_from_str() {
        assert_eq!("sqlite".parse::<CacheBackend>().unwrap(), CacheBackend::Sqlite);
        assert_eq!("MEMORY".parse::<CacheBackend>().unwrap(), CacheBackend::Memory);
        assert!(matches!("redis".parse::<CacheBackend>(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_with_data_dir_layout() {
        let settings = Settings::with_data_dir(PathBuf::from("/tmp/hkex"));
        assert_eq!(settings.document_db_path, PathBuf::from("/tmp/hkex/settlement.db"));
        assert_eq!(settings.cache_db_path, PathBuf::from("/tmp/hkex/cache.db"));
        assert_eq!(settings.timeseries_dir, PathBuf::from("/tmp/hkex/timeseries"));
        assert_eq!(settings.fetch_timeout, Duration::from_secs(30));
        assert!(!settings.hkex_base_url.ends_with('/'));
    }
}
