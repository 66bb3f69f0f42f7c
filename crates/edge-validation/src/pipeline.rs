//! # Validation Pipeline
//!
//! Runs a message through the stages in a fixed order and returns exactly
//! one outcome:
//!
//! ```text
//! canonicalize -> signature -> timestamp -> nonce -> decrypt -> rate limit -> ACCEPT
//! ```
//!
//! The first failing stage decides the rejection reason. A disabled stage
//! is skipped and counts as a pass; the order of the rest never changes.
//!
//! ## Concurrency
//!
//! `validate` takes `&self` and is safe to call from many threads. The only
//! shared mutable state is the replay cache and the rate buckets, both locked
//! per source. Canonicalization, HMAC and AEAD work run outside any lock.
//!
//! A nonce is recorded as soon as it passes the replay check, even if a later
//! stage rejects the message. Resending the same signed message can therefore
//! never get a second chance at the rate limiter.

use dashmap::DashSet;
use edge_telemetry::{
    log_stage, metric_inc, time_histogram, MESSAGES_ACCEPTED, MESSAGES_RECEIVED,
    MESSAGES_REJECTED, VALIDATION_DURATION,
};
use parking_lot::RwLock;
use shared_bus::{EventType, SecurityEvent, Severity};
use shared_types::{ForwardedTelemetry, KeyProvider, SourceKeys, TelemetryMessage};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::{ConfigError, PipelineConfig};
use crate::domain::canonical::{canonicalize, CanonicalMessage, Reading};
use crate::domain::confidentiality::open_reading;
use crate::domain::entities::{
    PipelineStats, Rejection, ValidationOutcome, ValidationReport,
};
use crate::domain::errors::{RejectReason, ValidationError};
use crate::domain::freshness::{check_timestamp, ReplayCache, ReplayPolicy};
use crate::domain::rate_limit::{RateLimiter, SourceStats};
use crate::domain::signature::SignatureVerifier;
use crate::ports::inbound::TelemetryValidationApi;
use crate::ports::outbound::{Clock, SystemClock};

/// Stage names used in logs and event details.
mod stage {
    pub const DECODE: &str = "decode";
    pub const CANONICALIZE: &str = "canonicalize";
    pub const SIGNATURE: &str = "signature";
    pub const TIMESTAMP: &str = "timestamp";
    pub const REPLAY: &str = "replay";
    pub const DECRYPTION: &str = "decryption";
    pub const RATE_LIMIT: &str = "rate_limit";
}

/// A stage failure with what is known about the message at that point.
struct StageFailure {
    stage: &'static str,
    error: ValidationError,
    source_id: Option<String>,
    nonce: Option<Uuid>,
}

impl StageFailure {
    fn at(stage: &'static str, error: ValidationError, canonical: &CanonicalMessage) -> Self {
        Self {
            stage,
            error,
            source_id: Some(canonical.source_id.clone()),
            nonce: Some(canonical.nonce),
        }
    }
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    accepted: AtomicU64,
    rejected: [AtomicU64; RejectReason::COUNT],
}

/// The edge message-validation pipeline.
pub struct ValidationPipeline {
    config: RwLock<Arc<PipelineConfig>>,
    keys: Arc<dyn KeyProvider>,
    verifier: SignatureVerifier<dyn KeyProvider>,
    replay: ReplayCache,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    counters: Counters,
    first_seen: DashSet<String>,
}

impl ValidationPipeline {
    /// Create a pipeline.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the configuration is invalid or `keys` knows no
    /// source at all.
    pub fn new(
        config: PipelineConfig,
        keys: Arc<dyn KeyProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if keys.source_count() == 0 {
            return Err(ConfigError::NoKeyMaterial);
        }

        info!(
            sources = keys.source_count(),
            window_secs = config.freshness.window_secs,
            algorithm = ?config.rate_limit.algorithm,
            stages = ?config.stages,
            "Validation pipeline initialized"
        );

        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            verifier: SignatureVerifier::new(Arc::clone(&keys)),
            keys,
            replay: ReplayCache::new(),
            limiter: RateLimiter::new(),
            clock,
            counters: Counters::default(),
            first_seen: DashSet::new(),
        })
    }

    /// Create a pipeline on the system clock.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_system_clock(
        config: PipelineConfig,
        keys: Arc<dyn KeyProvider>,
    ) -> Result<Self, ConfigError> {
        Self::new(config, keys, Arc::new(SystemClock::new()))
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<PipelineConfig> {
        Arc::clone(&self.config.read())
    }

    /// Number of sources with key material.
    pub fn source_count(&self) -> usize {
        self.keys.source_count()
    }

    /// Per-source rate limiter statistics.
    pub fn rate_stats(&self) -> BTreeMap<String, SourceStats> {
        self.limiter.all_stats()
    }

    /// Drop expired nonces from the replay cache. Returns how many.
    pub fn sweep_expired(&self) -> usize {
        let config = self.config();
        let policy = replay_policy(&config);
        let removed = self
            .replay
            .sweep_expired(self.clock.monotonic(), policy.retention);
        if removed > 0 {
            tracing::debug!(removed, remaining = self.replay.len(), "Swept replay cache");
        }
        removed
    }

    fn run_stages(
        &self,
        msg: &TelemetryMessage,
        config: &PipelineConfig,
    ) -> Result<ForwardedTelemetry, StageFailure> {
        let canonical = canonicalize(msg).map_err(|error| StageFailure {
            stage: stage::CANONICALIZE,
            error,
            source_id: msg.source_id.clone().filter(|s| !s.is_empty()),
            nonce: None,
        })?;
        let source_id = canonical.source_id.as_str();

        // Signature (when disabled, keys are still needed for decryption)
        let keys: Option<Arc<SourceKeys>> = if config.stages.signature {
            let keys = self
                .verifier
                .verify(&canonical, msg.signature.as_deref())
                .map_err(|e| StageFailure::at(stage::SIGNATURE, e, &canonical))?;
            Some(keys)
        } else {
            self.verifier.keys_for(source_id).ok()
        };

        // Freshness: window first so stale messages never touch the cache
        let now = self.clock.now();
        if config.stages.timestamp {
            check_timestamp(canonical.timestamp, now, config.freshness.window())
                .map_err(|e| StageFailure::at(stage::TIMESTAMP, e, &canonical))?;
        }
        if config.stages.replay {
            self.replay
                .check_and_insert(
                    source_id,
                    canonical.nonce,
                    self.clock.monotonic(),
                    replay_policy(config),
                )
                .map_err(|e| StageFailure::at(stage::REPLAY, e, &canonical))?;
        }

        // Confidentiality
        let (value, unit, decrypted) = match &canonical.reading {
            Reading::Plain(v) => (Some(*v), canonical.unit.clone(), false),
            Reading::Sealed { iv, ciphertext } if config.stages.decryption => {
                let reading =
                    open_reading(keys.as_deref(), source_id, &canonical.nonce, iv, ciphertext)
                        .map_err(|e| StageFailure::at(stage::DECRYPTION, e, &canonical))?;
                (
                    Some(reading.value),
                    reading.unit.or_else(|| canonical.unit.clone()),
                    true,
                )
            }
            Reading::Sealed { .. } => (None, canonical.unit.clone(), false),
        };

        if config.stages.rate_limit {
            self.limiter
                .check(source_id, &config.rate_limit, self.clock.monotonic(), now)
                .map_err(|e| StageFailure::at(stage::RATE_LIMIT, e, &canonical))?;
        }

        Ok(ForwardedTelemetry {
            source_id: canonical.source_id.clone(),
            kind: canonical.kind.clone(),
            value,
            unit,
            timestamp: canonical.timestamp,
            nonce: canonical.nonce,
            decrypted,
            processed_at: now,
        })
    }

    fn record_received(&self) {
        metric_inc!(MESSAGES_RECEIVED);
        self.counters.total.fetch_add(1, Ordering::Relaxed);
    }

    fn conclude(
        &self,
        result: Result<ForwardedTelemetry, StageFailure>,
        config: &PipelineConfig,
    ) -> ValidationReport {
        match result {
            Ok(telemetry) => self.accept(telemetry, config),
            Err(failure) => self.reject(failure),
        }
    }

    fn accept(&self, telemetry: ForwardedTelemetry, config: &PipelineConfig) -> ValidationReport {
        metric_inc!(MESSAGES_ACCEPTED);
        let seq = self.counters.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        let mut events = Vec::new();

        log_stage!(
            debug,
            "accept",
            telemetry.source_id,
            "Message accepted",
            kind = %telemetry.kind,
            decrypted = telemetry.decrypted
        );

        if self.first_seen.insert(telemetry.source_id.clone()) && config.events.emit_first_seen {
            events.push(
                SecurityEvent::new(
                    EventType::SourceFirstSeen,
                    Severity::Info,
                    format!("First accepted message from {}", telemetry.source_id),
                )
                .at(telemetry.processed_at)
                .with_source(telemetry.source_id.clone())
                .with_detail("kind", telemetry.kind.clone()),
            );
        }

        let every = config.events.sample_accepted_every;
        if every > 0 && seq % every == 0 {
            events.push(
                SecurityEvent::new(
                    EventType::TelemetryProcessed,
                    Severity::Info,
                    format!("Telemetry processed from {}", telemetry.source_id),
                )
                .at(telemetry.processed_at)
                .with_source(telemetry.source_id.clone())
                .with_detail("accepted_total", seq)
                .with_detail("nonce", telemetry.nonce.to_string()),
            );
        }

        ValidationReport {
            outcome: ValidationOutcome::Accepted(telemetry),
            events,
        }
    }

    fn reject(&self, failure: StageFailure) -> ValidationReport {
        let reason = failure.error.reason();
        metric_inc!(MESSAGES_REJECTED, &[reason.as_str()]);
        self.counters.rejected[reason.index()].fetch_add(1, Ordering::Relaxed);

        let rejection = Rejection::from_error(&failure.error, failure.source_id.clone());
        log_stage!(
            debug,
            failure.stage,
            failure.source_id.as_deref().unwrap_or("<unknown>"),
            "Message rejected",
            reason = reason.as_str(),
            detail = %rejection.detail
        );

        let mut event = SecurityEvent::new(reason.event_type(), reason.severity(), rejection.detail.clone())
            .at(self.clock.now())
            .with_detail("reason", reason.as_str())
            .with_detail("stage", failure.stage);
        if let Some(source_id) = &failure.source_id {
            event = event.with_source(source_id.clone());
        }
        if let Some(nonce) = failure.nonce {
            event = event.with_detail("nonce", nonce.to_string());
        }
        if let ValidationError::RateLimitExceeded { retry_after_ms, .. } = &failure.error {
            event = event.with_detail("retry_after_ms", *retry_after_ms);
        }

        ValidationReport {
            outcome: ValidationOutcome::Rejected(rejection),
            events: vec![event],
        }
    }
}

fn replay_policy(config: &PipelineConfig) -> ReplayPolicy {
    ReplayPolicy::for_window(
        config.freshness.window(),
        config.freshness.max_entries_per_source,
    )
}

impl TelemetryValidationApi for ValidationPipeline {
    fn validate(&self, message: &TelemetryMessage) -> ValidationReport {
        let _timer = time_histogram!(VALIDATION_DURATION);
        self.record_received();
        let config = self.config();
        let result = self.run_stages(message, &config);
        self.conclude(result, &config)
    }

    fn validate_json(&self, raw: &str) -> ValidationReport {
        match TelemetryMessage::from_json(raw) {
            Ok(message) => self.validate(&message),
            Err(e) => {
                let _timer = time_histogram!(VALIDATION_DURATION);
                self.record_received();
                let config = self.config();
                let failure = StageFailure {
                    stage: stage::DECODE,
                    error: ValidationError::Malformed(e.to_string()),
                    source_id: None,
                    nonce: None,
                };
                self.conclude(Err(failure), &config)
            }
        }
    }

    fn stats(&self) -> PipelineStats {
        let rejected = RejectReason::ALL
            .iter()
            .filter_map(|reason| {
                let count = self.counters.rejected[reason.index()].load(Ordering::Relaxed);
                (count > 0).then_some((*reason, count))
            })
            .collect();

        PipelineStats {
            total: self.counters.total.load(Ordering::Relaxed),
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            rejected,
            sources_seen: self.first_seen.len(),
            replay_cache_entries: self.replay.len(),
            rate_buckets: self.limiter.bucket_count(),
        }
    }

    fn reconfigure(&self, config: PipelineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        info!(
            window_secs = config.freshness.window_secs,
            algorithm = ?config.rate_limit.algorithm,
            stages = ?config.stages,
            "Pipeline reconfigured"
        );
        *self.config.write() = Arc::new(config);
        Ok(())
    }
}
