use super::{CacheStore, SharedCacheStore};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

fn expiry_from_ttl(ttl: Option<Duration>) -> Result<Option<DateTime<Utc>>> {
    match ttl {
        Some(ttl) => {
            let ttl = chrono::Duration::from_std(ttl)
                .map_err(|e| AppError::InvalidInput(format!("TTL out of range: {}", e)))?;
            Ok(Some(Utc::now() + ttl))
        }
        None => Ok(None),
    }
}

#[derive(Clone, Debug)]
struct MemoryEntry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl MemoryEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// Process-local cache; contents vanish when the process exits
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &'static str {
        "memory-cache"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: evict on read
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expires_at = expiry_from_ttl(ttl)?;
        let now = Utc::now();
        let mut entries = self.entries.write().await;

        // Sweep on write so keys that are never read again do not pile up
        entries.retain(|_, entry| !entry.is_expired(now));
        entries.insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {
        self.entries.write().await.clear();
    }
}

/// Cache persisted in a SQLite key-value table, so CLI runs share it
#[derive(Debug)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    pub async fn new(database_path: PathBuf) -> Result<Self> {
        info!("Initializing SQLite cache at: {:?}", database_path);

        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePool::connect_with(connect_options).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_entries_expires ON cache_entries(expires_at)")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        let purged = store.purge_expired().await?;
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        Ok(store)
    }

    /// Delete every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1")
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    fn name(&self) -> &'static str {
        "sqlite-cache"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT value, expires_at FROM cache_entries WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: Option<i64> = row.try_get("expires_at")?;
        if let Some(expires_at) = expires_at {
            if expires_at <= Utc::now().timestamp_millis() {
                debug!(key, "Cache entry expired");
                sqlx::query("DELETE FROM cache_entries WHERE key = ?1")
                    .bind(key)
                    .execute(&self.pool)
                    .await?;
                return Ok(None);
            }
        }

        let raw: String = row.try_get("value")?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expires_at = expiry_from_ttl(ttl)?.map(|at| at.timestamp_millis());
        let raw = serde_json::to_string(&value)?;

        self.purge_expired().await?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(raw)
        .bind(expires_at)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1")
            .bind(prefix)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A logical cache over a shared [`CacheStore`]: own key prefix, own TTL
#[derive(Clone)]
pub struct CacheNamespace {
    store: SharedCacheStore,
    prefix: &'static str,
    default_ttl: Option<Duration>,
}

impl CacheNamespace {
    pub fn new(store: SharedCacheStore, prefix: &'static str, default_ttl: Option<Duration>) -> Self {
        Self {
            store,
            prefix,
            default_ttl,
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Typed lookup; an entry that no longer decodes counts as a miss
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.full_key(key);
        match self.store.get(&full_key).await? {
            Some(value) => match serde_json::from_value(value) {
                Ok(decoded) => Ok(Some(decoded)),
                Err(e) => {
                    warn!(key = %full_key, error = %e, "Discarding undecodable cache entry");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Store with the namespace's default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.store.set(&self.full_key(key), value, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.store.delete(&self.full_key(key)).await
    }

    /// Remove every key in this namespace starting with `prefix`
    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        self.store.delete_prefix(&self.full_key(prefix)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_memory_cache_set_get_delete() {
        let cache = MemoryCacheStore::new();
        assert_eq!(cache.get("missing").await.unwrap(), None);

        cache.set("a", json!({"x": 1}), None).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), Some(json!({"x": 1})));
        assert_eq!(cache.entries.read().await.len(), 1);

        assert!(cache.delete("a").await.unwrap());
        assert!(!cache.delete("a").await.unwrap());
        assert_eq!(cache.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCacheStore::new();
        cache.set("short", json!("v"), Some(Duration::from_millis(20))).await.unwrap();
        cache.set("forever", json!("v"), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("forever").await.unwrap(), Some(json!("v")));
    }

    #[tokio::test]
    async fn test_memory_cache_reclaims_unread_expired_keys() {
        let cache = MemoryCacheStore::new();
        cache.set("query:symbol_search:2023-08-22:HTI", json!([1]), Some(Duration::from_millis(20))).await.unwrap();
        cache.set("query:symbol_search:2023-08-22:HSI", json!([2]), Some(Duration::from_millis(20))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.set("config:kept", json!(true), None).await.unwrap();

        let entries = cache.entries.read().await;
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("config:kept"));
    }

    #[tokio::test]
    async fn test_memory_cache_delete_prefix() {
        let cache = MemoryCacheStore::new();
        cache.set("query:symbol_search:2023-08-22:HTI", json!([]), None).await.unwrap();
        cache.set("query:symbol_search:2023-08-22:HSI", json!([]), None).await.unwrap();
        cache.set("query:symbol_search:2023-08-23:HTI", json!([]), None).await.unwrap();

        let removed = cache.delete_prefix("query:symbol_search:2023-08-22:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get("query:symbol_search:2023-08-23:HTI").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sqlite_cache_roundtrip_and_persistence() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("cache.db");

        let cache = SqliteCacheStore::new(db_path.clone()).await.unwrap();
        cache.ping().await.unwrap();
        cache.set("doc:2023-08-22", json!("raw text"), Some(Duration::from_secs(3600))).await.unwrap();
        cache.set("doc:2023-08-22", json!("newer text"), Some(Duration::from_secs(3600))).await.unwrap();
        cache.close().await;

        let reopened = SqliteCacheStore::new(db_path).await.unwrap();
        assert_eq!(reopened.get("doc:2023-08-22").await.unwrap(), Some(json!("newer text")));
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_sqlite_cache_expiry_and_prefix() {
        let temp_dir = tempdir().unwrap();
        let cache = SqliteCacheStore::new(temp_dir.path().join("cache.db")).await.unwrap();

        cache.set("query:a", json!(1), Some(Duration::from_millis(20))).await.unwrap();
        cache.set("query:b", json!(2), None).await.unwrap();
        cache.set("config:c", json!(3), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("query:a").await.unwrap(), None);

        assert_eq!(cache.delete_prefix("query:").await.unwrap(), 1);
        assert_eq!(cache.get("query:b").await.unwrap(), None);
        assert_eq!(cache.get("config:c").await.unwrap(), Some(json!(3)));
        cache.close().await;
    }

    async fn sqlite_row_count(cache: &SqliteCacheStore) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM cache_entries")
            .fetch_one(&cache.pool)
            .await
            .unwrap()
            .try_get("count")
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_cache_reclaims_unread_expired_keys() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        let cache = SqliteCacheStore::new(db_path.clone()).await.unwrap();

        cache.set("query:a", json!(1), Some(Duration::from_millis(20))).await.unwrap();
        cache.set("query:b", json!(2), Some(Duration::from_millis(20))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        cache.set("config:c", json!(3), None).await.unwrap();
        assert_eq!(sqlite_row_count(&cache).await, 1);

        // Reopening also clears anything that expired while closed
        cache.set("query:d", json!(4), Some(Duration::from_millis(20))).await.unwrap();
        cache.close().await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let reopened = SqliteCacheStore::new(db_path).await.unwrap();
        assert_eq!(sqlite_row_count(&reopened).await, 1);
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_namespaces_do_not_collide() {
        let store: SharedCacheStore = Arc::new(MemoryCacheStore::new());
        let documents = CacheNamespace::new(store.clone(), "doc:", Some(Duration::from_secs(3600)));
        let queries = CacheNamespace::new(store.clone(), "query:", Some(Duration::from_secs(1800)));

        documents.set("2023-08-22", &"raw".to_string()).await.unwrap();
        queries.set("2023-08-22", &vec![1, 2, 3]).await.unwrap();

        assert_eq!(documents.get::<String>("2023-08-22").await.unwrap(), Some("raw".to_string()));
        assert_eq!(queries.get::<Vec<i32>>("2023-08-22").await.unwrap(), Some(vec![1, 2, 3]));

        queries.delete_prefix("").await.unwrap();
        assert!(queries.get::<Vec<i32>>("2023-08-22").await.unwrap().is_none());
        assert!(documents.get::<String>("2023-08-22").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_namespace_undecodable_entry_is_a_miss() {
        let store: SharedCacheStore = Arc::new(MemoryCacheStore::new());
        store.set("doc:key", json!({"not": "a string"}), None).await.unwrap();

        let documents = CacheNamespace::new(store, "doc:", None);
        assert_eq!(documents.get::<String>("key").await.unwrap(), None);
    }
}
