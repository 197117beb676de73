//! # Pool-Sync Telemetry
//!
//! Logging and metrics shared by the sync engine, the tree service and the
//! operator tool.
//!
//! ## Components
//!
//! - **Logs**: `tracing` subscriber with env filtering, plain or JSON output
//! - **Metrics**: Prometheus counters, gauges and histograms in a global registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ps_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PS_SERVICE_NAME` | `pool-sync` | Service name in logs |
//! | `PS_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `PS_JSON_LOGS` | `false` | Emit JSON log lines |
//! | `PS_LOG_SOURCE` | `false` | Include file and line in logs |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, BATCH_DURATION, DEPOSIT_SHORTFALL,
    EVENTS_FETCHED, EVENTS_SAVED, LAST_SYNCED_BLOCK, LEAF_GAPS, REGISTRY, ROOT_MISMATCHES, RPC_RETRIES,
    SNAPSHOT_DUPLICATES, SOURCE_FAILURES, TREE_BUILD_DURATION, TREE_LEAVES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active. Logs shutdown on drop.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::debug!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
