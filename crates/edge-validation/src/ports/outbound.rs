//! # Outbound Ports (Driven Ports / SPI)
//!
//! Dependencies the validation service needs: somewhere to send accepted
//! telemetry, somewhere to send security events, and a clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared_bus::SecurityEvent;
use shared_types::ForwardedTelemetry;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error from cloud forwarding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForwardError {
    /// Ingestion endpoint unreachable
    #[error("Cloud ingestion unavailable: {0}")]
    Unavailable(String),

    /// Ingestion refused the reading
    #[error("Cloud ingestion rejected reading: {reason}")]
    Rejected {
        /// Refusal reason
        reason: String,
    },

    /// Forwarder has shut down
    #[error("Forwarder closed")]
    Closed,
}

/// Gateway to cloud ingestion.
///
/// Called strictly after a message is accepted. A failure here never
/// changes the validation outcome.
#[async_trait]
pub trait TelemetryForwarder: Send + Sync {
    /// Hand one accepted reading to the cloud side.
    ///
    /// # Errors
    /// * `ForwardError::Unavailable` - endpoint unreachable
    /// * `ForwardError::Rejected` - reading refused
    /// * `ForwardError::Closed` - forwarder shut down
    async fn forward(&self, telemetry: ForwardedTelemetry) -> Result<(), ForwardError>;
}

#[async_trait]
impl<T: TelemetryForwarder + ?Sized> TelemetryForwarder for std::sync::Arc<T> {
    async fn forward(&self, telemetry: ForwardedTelemetry) -> Result<(), ForwardError> {
        (**self).forward(telemetry).await
    }
}

/// Destination for security events (logging, alerting, storage).
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    /// Deliver one event. Delivery problems are the sink's to handle.
    async fn emit(&self, event: SecurityEvent);
}

#[async_trait]
impl<T: SecurityEventSink + ?Sized> SecurityEventSink for std::sync::Arc<T> {
    async fn emit(&self, event: SecurityEvent) {
        (**self).emit(event).await;
    }
}

/// Source of time for the pipeline.
///
/// Wall time is compared against message timestamps; monotonic time drives
/// the replay cache and rate buckets so wall clock jumps cannot refill a
/// bucket or expire a nonce early.
pub trait Clock: Send + Sync {
    /// Current wall time.
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic time since an arbitrary fixed origin.
    fn monotonic(&self) -> Duration;
}

/// The system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose monotonic origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock moved by hand, for deterministic tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<(DateTime<Utc>, Duration)>,
}

impl ManualClock {
    /// Start at wall time `start` with monotonic time zero.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new((start, Duration::ZERO)),
        }
    }

    /// Move both clocks forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.0 += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        state.1 += by;
    }

    /// Set the wall clock only, as an NTP step would.
    pub fn set_wall(&self, wall: DateTime<Utc>) {
        self.state.lock().0 = wall;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().0
    }

    fn monotonic(&self) -> Duration {
        self.state.lock().1
    }
}
