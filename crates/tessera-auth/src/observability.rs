//! `tracing` subscriber setup for hosts embedding the core.
//!
//! The core itself only emits events and spans; installing a subscriber is
//! left to the host, which can call one of these once at startup.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingSettings;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER: OnceLock<FilterHandle> = OnceLock::new();

/// Installs the subscriber at `info`.
pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Installs the subscriber using the configured level.
pub fn init_from_settings(settings: &LoggingSettings) {
    init_tracing_with_level(&settings.level);
}

/// Installs a registry with a reloadable filter and an `fmt` layer.
///
/// `RUST_LOG` wins over `level` when set. Calling this twice keeps the first
/// subscriber.
pub fn init_tracing_with_level(level: &str) {
    let filter = initial_filter(level);
    let (filter_layer, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();
    if installed {
        let _ = FILTER.set(handle);
    }
}

/// Swaps the active filter.
///
/// Returns `false` when no subscriber was installed through this module or
/// `level` is not a valid filter directive.
pub fn apply_logging_level(level: &str) -> bool {
    let Some(handle) = FILTER.get() else {
        return false;
    };
    match EnvFilter::try_new(level) {
        Ok(filter) => handle.reload(filter).is_ok(),
        Err(e) => {
            tracing::warn!(level, error = %e, "ignoring invalid log level");
            false
        }
    }
}

fn initial_filter(level: &str) -> EnvFilter {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
    }
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}
