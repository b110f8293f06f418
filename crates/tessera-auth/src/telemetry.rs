//! Telemetry sink injected into every component.
//!
//! Components never touch a process-wide provider; they receive an
//! `Arc<dyn TelemetrySink>` at construction and report through it.
//! [`MetricsTelemetry`] forwards to the `metrics` facade, which is wired to an
//! exporter by the host process.

use std::sync::Arc;

use metrics::counter;

use crate::error::AuthError;

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "tessera_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "tessera_cache_misses_total";
    pub const CACHE_ERRORS_TOTAL: &str = "tessera_cache_errors_total";
    pub const CACHE_WRITE_FAILURES_TOTAL: &str = "tessera_cache_write_failures_total";
    pub const CACHE_INVALIDATIONS_TOTAL: &str = "tessera_cache_invalidations_total";
    pub const AUTHZ_DECISIONS_TOTAL: &str = "tessera_authz_decisions_total";
    pub const TOKENS_ISSUED_TOTAL: &str = "tessera_tokens_issued_total";
    pub const TOKENS_REJECTED_TOTAL: &str = "tessera_tokens_rejected_total";
    pub const OPERATION_ERRORS_TOTAL: &str = "tessera_operation_errors_total";
}

/// Counters the core increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// A cache read returned a value. Label: key kind.
    CacheHit,
    /// A cache read found nothing. Label: key kind.
    CacheMiss,
    /// A cache read failed in transport or timed out. Label: key kind.
    CacheError,
    /// A write-back after a miss failed. Label: key kind.
    CacheWriteFailure,
    /// A cache entry was removed. Label: key kind.
    CacheInvalidation,
    /// An authorization decision was made. Label: `allow` or `deny`.
    AuthzDecision,
    /// A token was signed. Label: token type.
    TokenIssued,
    /// A token failed verification. Label: failure code.
    TokenRejected,
}

impl Counter {
    /// Metric name for this counter.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CacheHit => names::CACHE_HITS_TOTAL,
            Self::CacheMiss => names::CACHE_MISSES_TOTAL,
            Self::CacheError => names::CACHE_ERRORS_TOTAL,
            Self::CacheWriteFailure => names::CACHE_WRITE_FAILURES_TOTAL,
            Self::CacheInvalidation => names::CACHE_INVALIDATIONS_TOTAL,
            Self::AuthzDecision => names::AUTHZ_DECISIONS_TOTAL,
            Self::TokenIssued => names::TOKENS_ISSUED_TOTAL,
            Self::TokenRejected => names::TOKENS_REJECTED_TOTAL,
        }
    }

    fn label_key(&self) -> &'static str {
        match self {
            Self::CacheHit
            | Self::CacheMiss
            | Self::CacheError
            | Self::CacheWriteFailure
            | Self::CacheInvalidation => "kind",
            Self::AuthzDecision => "decision",
            Self::TokenIssued => "token_type",
            Self::TokenRejected => "reason",
        }
    }
}

/// Receiver for the observability signals emitted by the core.
pub trait TelemetrySink: Send + Sync {
    /// Increments `counter` by one with a single label value.
    fn increment(&self, counter: Counter, label: &str);

    /// Records that `operation` failed with `error`.
    fn record_error(&self, operation: &'static str, error: &AuthError);
}

/// Shared handle to a telemetry sink.
pub type DynTelemetry = Arc<dyn TelemetrySink>;

/// Sink that emits `metrics` counters and logs errors through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsTelemetry;

impl TelemetrySink for MetricsTelemetry {
    fn increment(&self, c: Counter, label: &str) {
        counter!(c.name(), c.label_key() => label.to_string()).increment(1);
    }

    fn record_error(&self, operation: &'static str, error: &AuthError) {
        let category = error.category();
        counter!(
            names::OPERATION_ERRORS_TOTAL,
            "operation" => operation,
            "category" => category.as_str()
        )
        .increment(1);

        if error.is_server_error() {
            tracing::error!(operation, %category, error = %error, "operation failed");
        } else {
            tracing::debug!(operation, %category, error = %error, "operation rejected");
        }
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn increment(&self, _counter: Counter, _label: &str) {}

    fn record_error(&self, _operation: &'static str, _error: &AuthError) {}
}

/// Reports `result`'s error (if any) to `telemetry` and passes it through.
pub(crate) fn observe<T>(
    telemetry: &dyn TelemetrySink,
    operation: &'static str,
    result: Result<T, AuthError>,
) -> Result<T, AuthError> {
    if let Err(ref err) = result {
        telemetry.record_error(operation, err);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingTelemetry;

    #[test]
    fn test_counter_names_are_distinct() {
        let all = [
            Counter::CacheHit,
            Counter::CacheMiss,
            Counter::CacheError,
            Counter::CacheWriteFailure,
            Counter::CacheInvalidation,
            Counter::AuthzDecision,
            Counter::TokenIssued,
            Counter::TokenRejected,
        ];
        let mut seen: Vec<&str> = all.iter().map(Counter::name).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), all.len());
    }

    #[test]
    fn test_observe_records_errors_only() {
        let telemetry = RecordingTelemetry::default();

        let ok: Result<u8, AuthError> = observe(&telemetry, "op", Ok(1));
        assert!(ok.is_ok());
        assert!(telemetry.errors().is_empty());

        let err: Result<u8, AuthError> = observe(&telemetry, "op", Err(AuthError::Unauthorized));
        assert!(err.is_err());
        assert_eq!(telemetry.errors(), vec![("op", "authorization".to_string())]);
    }

    #[test]
    fn test_metrics_telemetry_without_recorder() {
        // No recorder installed: the facade must be a silent no-op.
        MetricsTelemetry.increment(Counter::CacheHit, "authz");
        MetricsTelemetry.record_error("authorize", &AuthError::Unauthorized);
    }
}
