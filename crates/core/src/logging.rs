//! Unified logging integration
//!
//! Every component logs through the `tracing` macros. By default a
//! `tracing-subscriber` fmt layer prints them; with the `ftlog` feature the
//! binary can install ftlog instead and `tracing` forwards to it via `log`.

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Install the fmt subscriber with an `info` default. Safe to call more than once.
pub fn init_logging() {
    init_logging_with("info");
}

/// Install the fmt subscriber. `RUST_LOG` wins over `default_filter`; only
/// the first call in a process has any effect.
pub fn init_logging_with(default_filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::TRACE)
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_names(true)
            .finish();

        // Another subscriber (a test harness, an embedding binary) may already own the global slot.
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::debug!("📝 Initialized tracing logging");
        }
    });
}

/// Initialize ftlog as the `log` backend.
///
/// The returned guard flushes pending records when dropped; hold it for the
/// lifetime of the process.
#[cfg(feature = "ftlog")]
pub fn init_ftlog() -> Result<ftlog::LoggerGuard, String> {
    let guard = ftlog::builder()
        .max_log_level(ftlog::LevelFilter::Info)
        .bounded(100_000, false) // 100k buffer, non-blocking
        .utc()
        .try_init()
        .map_err(|e| format!("Failed to initialize ftlog: {e}"))?;

    tracing::info!("📝 Initialized ftlog unified logging");
    Ok(guard)
}

/// Log an operation's latency, promoting slow ones to info
#[macro_export]
macro_rules! log_latency {
    ($operation:expr, $duration_micros:expr) => {
        if $duration_micros < 1000 {
            tracing::debug!("⚡ {} completed in {}μs", $operation, $duration_micros);
        } else {
            tracing::info!("⚡ {} completed in {:.3}ms", $operation, $duration_micros as f64 / 1000.0);
        }
    };
}
