//! Read-through cache-aside primitive.
//!
//! [`CacheAside::fetch`] serves a typed value from the key/value store, or
//! computes it from the authoritative source and writes it back. Every store
//! call is bounded by a query timeout shorter than the request deadline, and
//! any store failure degrades to a direct source read. The single failure
//! that surfaces from the cache itself is a stored value that no longer
//! decodes.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::backend::DynKeyValueStore;
use super::codec::Codec;
use super::keys::key_kind;
use crate::AuthResult;
use crate::context::OperationContext;
use crate::error::AuthError;
use crate::telemetry::{Counter, DynTelemetry};

/// Default bound on a single cache call.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(50);

/// Cache-aside reader over a key/value store.
#[derive(Clone)]
pub struct CacheAside {
    store: DynKeyValueStore,
    telemetry: DynTelemetry,
    query_timeout: Duration,
}

impl CacheAside {
    /// Creates a reader with the given default query timeout.
    #[must_use]
    pub fn new(store: DynKeyValueStore, telemetry: DynTelemetry, query_timeout: Duration) -> Self {
        Self {
            store,
            telemetry,
            query_timeout,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &DynKeyValueStore {
        &self.store
    }

    /// Default query timeout.
    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// [`fetch_with_timeout`](Self::fetch_with_timeout) using the default
    /// query timeout.
    pub async fn fetch<T, C, F, Fut>(
        &self,
        ctx: &OperationContext,
        key: &str,
        codec: &C,
        ttl: Duration,
        compute: F,
    ) -> AuthResult<T>
    where
        T: Serialize + DeserializeOwned,
        C: Codec,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AuthResult<T>>,
    {
        self.fetch_with_timeout(ctx, key, codec, self.query_timeout, ttl, compute)
            .await
    }

    /// Returns the cached value for `key`, or computes, stores and returns it.
    ///
    /// # Errors
    /// - `Internal` when a cached value fails to decode.
    /// - Whatever `compute` returns, unchanged.
    /// - `Cancelled` / `DeadlineExceeded` when `ctx` fires first.
    ///
    /// Store failures, timeouts and write-back failures never surface.
    #[instrument(skip(self, ctx, codec, compute), fields(codec = codec.name()))]
    pub async fn fetch_with_timeout<T, C, F, Fut>(
        &self,
        ctx: &OperationContext,
        key: &str,
        codec: &C,
        query_timeout: Duration,
        ttl: Duration,
        compute: F,
    ) -> AuthResult<T>
    where
        T: Serialize + DeserializeOwned,
        C: Codec,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AuthResult<T>>,
    {
        let kind = key_kind(key);

        let read = ctx
            .run(tokio::time::timeout(query_timeout, self.store.get(key)))
            .await?;
        match read {
            Ok(Ok(Some(bytes))) => {
                self.telemetry.increment(Counter::CacheHit, kind);
                tracing::debug!("cache hit");
                return codec.decode(&bytes).map_err(|e| {
                    tracing::error!(error = %e, "cached value is corrupt");
                    AuthError::internal(format!("cached value for {key} is unreadable: {e}"))
                });
            }
            Ok(Ok(None)) => {
                self.telemetry.increment(Counter::CacheMiss, kind);
                tracing::debug!("cache miss");
            }
            Ok(Err(e)) => {
                self.telemetry.increment(Counter::CacheError, kind);
                tracing::warn!(error = %e, "cache read failed, reading from source");
            }
            Err(_) => {
                self.telemetry.increment(Counter::CacheError, kind);
                tracing::warn!(timeout = ?query_timeout, "cache read timed out, reading from source");
            }
        }

        let value = ctx.run(compute()).await??;
        self.write_back(ctx, key, codec, query_timeout, ttl, &value)
            .await;
        Ok(value)
    }

    async fn write_back<T, C>(
        &self,
        ctx: &OperationContext,
        key: &str,
        codec: &C,
        query_timeout: Duration,
        ttl: Duration,
        value: &T,
    ) where
        T: Serialize,
        C: Codec,
    {
        let kind = key_kind(key);
        let bytes = match codec.encode(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.telemetry.increment(Counter::CacheWriteFailure, kind);
                tracing::warn!(error = %e, "cache write-back skipped");
                return;
            }
        };

        let write = ctx
            .run(tokio::time::timeout(
                query_timeout,
                self.store.set(key, bytes, ttl),
            ))
            .await;
        let failure = match write {
            Ok(Ok(Ok(()))) => return,
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(_)) => "timed out".to_string(),
            // The value is complete; the caller still gets it.
            Err(e) => e.to_string(),
        };
        self.telemetry.increment(Counter::CacheWriteFailure, kind);
        tracing::warn!(error = %failure, "cache write-back failed");
    }

    /// Deletes `key`. A missing key is not an error.
    ///
    /// # Errors
    /// `Dependency` when the store fails or times out, `Cancelled` /
    /// `DeadlineExceeded` when `ctx` fires first.
    #[instrument(skip(self, ctx))]
    pub async fn remove(&self, ctx: &OperationContext, key: &str) -> AuthResult<()> {
        let kind = key_kind(key);
        let result = ctx
            .run(tokio::time::timeout(self.query_timeout, self.store.delete(key)))
            .await?;
        match result {
            Ok(Ok(())) => {
                self.telemetry.increment(Counter::CacheInvalidation, kind);
                tracing::debug!("cache entry removed");
                Ok(())
            }
            Ok(Err(e)) => {
                self.telemetry.increment(Counter::CacheError, kind);
                Err(AuthError::dependency(format!("cache delete failed: {e}")))
            }
            Err(_) => {
                self.telemetry.increment(Counter::CacheError, kind);
                Err(AuthError::dependency("cache delete timed out"))
            }
        }
    }
}
