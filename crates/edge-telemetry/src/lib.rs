//! # Edge Telemetry
//!
//! Logging and metrics for the edge validation pipeline.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with pretty or JSON output
//! - **Security events**: [`logging::log_security_event`] logs each event at
//!   the level matching its severity
//! - **Metrics**: Prometheus counters, gauges and histograms
//!
//! ## Usage
//!
//! ```rust,ignore
//! use edge_telemetry::{TelemetryConfig, init_telemetry};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // Logs and metrics are now being collected
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EDGE_SERVICE_NAME` | `edge-validator` | Service name in logs |
//! | `EDGE_LOG_LEVEL` / `LOG_LEVEL` | `info` | Log level filter |
//! | `EDGE_LOG_JSON` / `LOG_JSON` | `false` | JSON log lines |
//! | `EDGE_METRICS_ENABLED` | `true` | Register Prometheus metrics |

#![warn(missing_docs)]

mod config;
pub mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::{parse_flag, TelemetryConfig};
pub use logging::log_security_event;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, FORWARD_ATTEMPTS, MESSAGES_ACCEPTED,
    MESSAGES_RECEIVED, MESSAGES_REJECTED, REPLAY_CACHE_ENTRIES, REPLAY_CACHE_EVICTIONS,
    SIGNATURE_FAILURES, SIGNATURE_VERIFICATIONS, VALIDATION_DURATION,
};
pub use tracing_setup::{build_filter, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Global subscriber could not be installed
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    /// Prometheus registry rejected a collector
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
///
/// # Errors
///
/// Returns `TelemetryError` if the subscriber or metrics cannot be set up.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    let tracing = tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        _tracing: tracing,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: Option<MetricsHandle>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
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
