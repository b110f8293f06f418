//! Test doubles shared by unit and integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{CacheError, KeyValueStore, LocalStore};
use crate::error::AuthError;
use crate::telemetry::{Counter, TelemetrySink};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Telemetry sink that remembers every signal.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    counters: Mutex<Vec<(Counter, String)>>,
    errors: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingTelemetry {
    /// Number of increments of `counter`, any label.
    pub fn count(&self, counter: Counter) -> usize {
        lock(&self.counters)
            .iter()
            .filter(|(c, _)| *c == counter)
            .count()
    }

    /// Number of increments of `counter` with exactly `label`.
    pub fn count_labeled(&self, counter: Counter, label: &str) -> usize {
        lock(&self.counters)
            .iter()
            .filter(|(c, l)| *c == counter && l == label)
            .count()
    }

    /// Recorded errors as `(operation, category)` pairs.
    pub fn errors(&self) -> Vec<(&'static str, String)> {
        lock(&self.errors).clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn increment(&self, counter: Counter, label: &str) {
        lock(&self.counters).push((counter, label.to_string()));
    }

    fn record_error(&self, operation: &'static str, error: &AuthError) {
        lock(&self.errors).push((operation, error.category().to_string()));
    }
}

/// Key/value store whose every call fails.
#[derive(Debug, Default)]
pub struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self) -> CacheError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        CacheError::Connection("backend unavailable".to_string())
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(self.fail())
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        Err(self.fail())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(self.fail())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(self.fail())
    }

    fn mode(&self) -> &'static str {
        "failing"
    }
}

/// Local store that answers every call only after `delay`.
#[derive(Debug, Clone)]
pub struct SlowStore {
    inner: LocalStore,
    delay: Duration,
}

impl SlowStore {
    /// Wraps a fresh local store.
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: LocalStore::new(),
            delay,
        }
    }

    /// The wrapped store, for direct inspection.
    pub fn inner(&self) -> &LocalStore {
        &self.inner
    }
}

#[async_trait]
impl KeyValueStore for SlowStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(key).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    fn mode(&self) -> &'static str {
        "slow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slow_store_clones_share_entries() {
        let store = SlowStore::new(Duration::from_millis(1));
        let clone = store.clone();
        store
            .set("authz:1", b"doc".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(clone.inner().contains("authz:1"));
        assert!(format!("{store:?}").contains("SlowStore"));
    }
}
