//! Key/value cache backends: in-process (DashMap) and Redis.
//!
//! Backends report transport failures as [`CacheError`]. The cache-aside
//! primitive turns every such failure into a miss, so nothing here needs to
//! retry or degrade on its own.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use crate::config::{CacheSettings, RedisSettings};

/// Transport-level cache failures.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No connection could be obtained.
    #[error("cache connection failed: {0}")]
    Connection(String),

    /// The backend rejected or failed the command.
    #[error("cache command failed: {0}")]
    Command(String),
}

/// External key/value store used by the cache-aside primitive.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored bytes, or `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), CacheError>;

    /// Backend name for logs and health reports.
    fn mode(&self) -> &'static str;
}

/// Shared handle to a key/value store.
pub type DynKeyValueStore = Arc<dyn KeyValueStore>;

/// A cached entry with TTL support.
#[derive(Clone, Debug)]
struct CachedEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

/// Single-instance store backed by a concurrent map.
///
/// Expired entries are dropped lazily on read and by
/// [`cleanup_expired`](Self::cleanup_expired).
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    map: Arc<DashMap<String, CachedEntry>>,
}

impl LocalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including expired ones not yet collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` when the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns `true` if `key` holds a live entry.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.map.get(key).is_some_and(|e| !e.is_expired())
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| !entry.is_expired());
        before - self.map.len()
    }
}

#[async_trait]
impl KeyValueStore for LocalStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(entry) = self.map.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.data.clone()));
            }
            // Remove expired entry
            drop(entry);
            self.map.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.map.insert(
            key.to_string(),
            CachedEntry {
                data: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.map.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn mode(&self) -> &'static str {
        "local"
    }
}

/// Multi-instance store backed by a Redis connection pool.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool from settings without connecting.
    pub fn from_settings(settings: &RedisSettings) -> Result<Self, CacheError> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let mut redis_config = deadpool_redis::Config::from_url(&settings.url);
        let mut pool_config = deadpool_redis::PoolConfig::new(settings.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        // SET EX rejects 0; sub-second TTLs round up.
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map(|_| ())
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    fn mode(&self) -> &'static str {
        "redis"
    }
}

/// Creates the configured store.
///
/// Redis is used when enabled and reachable; otherwise the local store is
/// returned with a warning so the process still starts.
pub async fn create_store(cache: &CacheSettings) -> DynKeyValueStore {
    let settings = &cache.redis;
    if !settings.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return Arc::new(LocalStore::new());
    }

    tracing::info!(url = %settings.url, "Connecting to Redis");

    let store = match RedisStore::from_settings(settings) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Redis pool. Falling back to local cache.");
            return Arc::new(LocalStore::new());
        }
    };

    match store.ping().await {
        Ok(()) => {
            tracing::info!("Connected to Redis");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unreachable. Falling back to local cache.");
            Arc::new(LocalStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::block_on;

    use super::*;

    #[tokio::test]
    async fn test_local_get_set_delete() {
        let store = LocalStore::new();
        store
            .set("authz:1", b"doc".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("authz:1").await.unwrap(), Some(b"doc".to_vec()));
        assert!(store.contains("authz:1"));

        store.delete("authz:1").await.unwrap();
        assert_eq!(store.get("authz:1").await.unwrap(), None);
    }

    #[test]
    fn test_local_delete_absent_key() {
        let store = LocalStore::new();
        block_on(store.delete("missing")).unwrap();
        assert!(block_on(store.get("missing")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_expiration() {
        let store = LocalStore::new();
        store
            .set("short", b"v".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(store.get("short").await.unwrap().is_some());

        std::thread::sleep(Duration::from_millis(20));

        assert!(store.get("short").await.unwrap().is_none());
        assert!(store.is_empty(), "expired entry removed on read");
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = LocalStore::new();
        for i in 0..3 {
            store
                .set(&format!("k{i}"), vec![i], Duration::from_millis(5))
                .await
                .unwrap();
        }
        store
            .set("live", vec![9], Duration::from_secs(60))
            .await
            .unwrap();

        std::thread::sleep(Duration::from_millis(15));

        assert_eq!(store.cleanup_expired(), 3);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_store_disabled_is_local() {
        let store = create_store(&CacheSettings::default()).await;
        assert_eq!(store.mode(), "local");
    }

    #[tokio::test]
    async fn test_create_store_unreachable_redis_falls_back() {
        let settings = CacheSettings {
            redis: RedisSettings {
                enabled: true,
                url: "redis://127.0.0.1:1".to_string(),
                pool_size: 1,
                timeout_ms: 100,
            },
            ..CacheSettings::default()
        };
        let store = create_store(&settings).await;
        assert_eq!(store.mode(), "local");
    }
}
