//! Logging setup.
//!
//! Navcov itself only emits `tracing` events. Host runners that do not
//! install their own subscriber can call [`init_logging`].

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "navcov=info";

/// Output format for [`init_logging`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Build the filter: `RUST_LOG` wins, then `fallback`, then [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter(fallback: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a global fmt subscriber.
///
/// Returns `false` if a global subscriber was already set, which makes
/// repeated calls (e.g. from several tests) harmless.
pub fn init_logging(format: LogFormat, filter: Option<&str>) -> bool {
    let builder = fmt().with_env_filter(env_filter(filter)).with_target(true);
    match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
