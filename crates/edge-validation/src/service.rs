//! # Edge Validation Service
//!
//! Application service that wires the pipeline to its outbound ports.
//!
//! ## Flow
//!
//! ```text
//! broker ──TelemetryMessage──→ [ValidationPipeline]
//!                                      │
//!                       ┌──────────────┴──────────────┐
//!                       ↓                             ↓
//!                  [accepted]                    [rejected]
//!                       │                             │
//!          events ──→ [SecurityEventSink] ←── events ─┘
//!                       │
//!                       ↓
//!             [TelemetryForwarder] ──→ cloud ingestion
//! ```
//!
//! Forwarding happens strictly after acceptance. A forwarding failure is
//! reported as a `cloud_send_failure` event and never changes the outcome.

use edge_telemetry::{metric_inc, FORWARD_ATTEMPTS};
use shared_bus::{EventType, SecurityEvent, Severity};
use shared_types::TelemetryMessage;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::entities::{ValidationOutcome, ValidationReport};
use crate::pipeline::ValidationPipeline;
use crate::ports::inbound::TelemetryValidationApi;
use crate::ports::outbound::{SecurityEventSink, TelemetryForwarder};

/// Validation service.
///
/// Implements the full per-message flow: validate, deliver events, forward.
pub struct EdgeValidationService<F: TelemetryForwarder, S: SecurityEventSink> {
    pipeline: Arc<ValidationPipeline>,
    forwarder: F,
    events: S,
}

impl<F: TelemetryForwarder, S: SecurityEventSink> EdgeValidationService<F, S> {
    /// Create a new service.
    ///
    /// # Arguments
    /// * `pipeline` - Shared validation pipeline
    /// * `forwarder` - Cloud ingestion gateway
    /// * `events` - Security event destination
    pub fn new(pipeline: Arc<ValidationPipeline>, forwarder: F, events: S) -> Self {
        Self {
            pipeline,
            forwarder,
            events,
        }
    }

    /// The underlying pipeline.
    pub fn pipeline(&self) -> &Arc<ValidationPipeline> {
        &self.pipeline
    }

    /// Validate one decoded message, emit its events and forward it if
    /// accepted. Returns the validation outcome.
    pub async fn process(&self, message: &TelemetryMessage) -> ValidationOutcome {
        let report = self.pipeline.validate(message);
        self.complete(report).await
    }

    /// Same as [`process`](Self::process) for a raw JSON message.
    pub async fn process_json(&self, raw: &str) -> ValidationOutcome {
        let report = self.pipeline.validate_json(raw);
        self.complete(report).await
    }

    /// Emit a `system_startup` event.
    pub async fn announce_startup(&self) {
        let config = self.pipeline.config();
        info!(sources = self.pipeline.source_count(), "Edge validation service starting");
        let event = SecurityEvent::new(
            EventType::SystemStartup,
            Severity::Info,
            "Edge validation service started",
        )
        .with_detail("sources", self.pipeline.source_count())
        .with_detail("window_secs", config.freshness.window_secs)
        .with_detail("signature", config.stages.signature)
        .with_detail("timestamp", config.stages.timestamp)
        .with_detail("replay", config.stages.replay)
        .with_detail("decryption", config.stages.decryption)
        .with_detail("rate_limit", config.stages.rate_limit);
        self.events.emit(event).await;
    }

    /// Emit a `system_shutdown` event carrying the final counters.
    pub async fn announce_shutdown(&self) {
        let stats = self.pipeline.stats();
        info!(
            total = stats.total,
            accepted = stats.accepted,
            rejected = stats.rejected_total(),
            "Edge validation service stopping"
        );
        let event = SecurityEvent::new(
            EventType::SystemShutdown,
            Severity::Info,
            "Edge validation service stopped",
        )
        .with_detail("total", stats.total)
        .with_detail("accepted", stats.accepted)
        .with_detail("rejected", stats.rejected_total());
        self.events.emit(event).await;
    }

    async fn complete(&self, report: ValidationReport) -> ValidationOutcome {
        let ValidationReport { outcome, events } = report;
        for event in events {
            self.events.emit(event).await;
        }

        if let ValidationOutcome::Accepted(telemetry) = &outcome {
            match self.forwarder.forward(telemetry.clone()).await {
                Ok(()) => {
                    metric_inc!(FORWARD_ATTEMPTS, &["success"]);
                    debug!(
                        source_id = %telemetry.source_id,
                        nonce = %telemetry.nonce,
                        "Telemetry forwarded"
                    );
                }
                Err(e) => {
                    metric_inc!(FORWARD_ATTEMPTS, &["failure"]);
                    warn!(source_id = %telemetry.source_id, error = %e, "Forwarding failed");
                    let event = SecurityEvent::new(
                        EventType::CloudSendFailure,
                        Severity::Error,
                        format!("Failed to forward telemetry: {e}"),
                    )
                    .with_source(telemetry.source_id.clone())
                    .with_detail("nonce", telemetry.nonce.to_string());
                    self.events.emit(event).await;
                }
            }
        }

        outcome
    }
}
