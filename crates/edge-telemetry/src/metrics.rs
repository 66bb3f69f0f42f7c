//! Prometheus metrics for the edge validation pipeline.
//!
//! All metrics follow the naming convention: `edge_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., messages_received_total)
//! - **Gauge**: Value that can go up or down (e.g., replay_cache_entries)
//! - **Histogram**: Distribution of values (e.g., validation_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PIPELINE
    // =========================================================================

    /// Messages handed to the pipeline
    pub static ref MESSAGES_RECEIVED: Counter = Counter::new(
        "edge_messages_received_total",
        "Total telemetry messages handed to the validation pipeline"
    ).expect("metric creation failed");

    /// Messages accepted
    pub static ref MESSAGES_ACCEPTED: Counter = Counter::new(
        "edge_messages_accepted_total",
        "Total telemetry messages accepted"
    ).expect("metric creation failed");

    /// Messages rejected, by reason
    pub static ref MESSAGES_REJECTED: CounterVec = CounterVec::new(
        Opts::new("edge_messages_rejected_total", "Total telemetry messages rejected"),
        &["reason"]
    ).expect("metric creation failed");

    /// End-to-end validation time
    pub static ref VALIDATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "edge_validation_duration_seconds",
            "Time spent validating one message"
        ).buckets(exponential_buckets(0.000_01, 2.0, 16).unwrap_or_default())
    ).expect("metric creation failed");

    // =========================================================================
    // SIGNATURE
    // =========================================================================

    /// HMAC verifications attempted
    pub static ref SIGNATURE_VERIFICATIONS: Counter = Counter::new(
        "edge_signature_verifications_total",
        "Total HMAC verifications attempted"
    ).expect("metric creation failed");

    /// HMAC verifications that failed
    pub static ref SIGNATURE_FAILURES: Counter = Counter::new(
        "edge_signature_failures_total",
        "Total HMAC verifications that failed"
    ).expect("metric creation failed");

    // =========================================================================
    // FRESHNESS
    // =========================================================================

    /// Entries currently held by the replay cache
    pub static ref REPLAY_CACHE_ENTRIES: Gauge = Gauge::new(
        "edge_replay_cache_entries",
        "Nonces currently held by the replay cache"
    ).expect("metric creation failed");

    /// Entries evicted because a source hit its cache capacity
    pub static ref REPLAY_CACHE_EVICTIONS: Counter = Counter::new(
        "edge_replay_cache_evictions_total",
        "Nonces evicted before expiry because a source hit its capacity"
    ).expect("metric creation failed");

    // =========================================================================
    // FORWARDING
    // =========================================================================

    /// Forward attempts, by outcome
    pub static ref FORWARD_ATTEMPTS: CounterVec = CounterVec::new(
        Opts::new("edge_forward_attempts_total", "Cloud forward attempts"),
        &["outcome"]  // outcome: success/failure
    ).expect("metric creation failed");
}

/// Handle proving the metrics were registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with the global registry.
///
/// Calling it twice is harmless: already-registered collectors are skipped.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` for any registry error other than a
/// duplicate registration.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MESSAGES_RECEIVED.clone()),
        Box::new(MESSAGES_ACCEPTED.clone()),
        Box::new(MESSAGES_REJECTED.clone()),
        Box::new(VALIDATION_DURATION.clone()),
        Box::new(SIGNATURE_VERIFICATIONS.clone()),
        Box::new(SIGNATURE_FAILURES.clone()),
        Box::new(REPLAY_CACHE_ENTRIES.clone()),
        Box::new(REPLAY_CACHE_EVICTIONS.clone()),
        Box::new(FORWARD_ATTEMPTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Encode all metrics as Prometheus text format.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if encoding fails.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
