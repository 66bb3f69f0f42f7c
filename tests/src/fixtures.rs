//! # Test Fixtures
//!
//! A pipeline on a [`ManualClock`] with a handful of keyed sources and a
//! sealer per source, so scenarios read like a sensor talking to the edge.

use chrono::{DateTime, TimeZone, Utc};
use edge_validation::{
    Clock, ManualClock, PipelineConfig, TelemetrySealer, TelemetryValidationApi, ValidationOutcome,
    ValidationPipeline,
};
use shared_crypto::AeadKey;
use shared_types::{MacKey, SourceKeys, StaticKeyStore, TelemetryMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Fixed start instant for every harness.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Deterministic keys for a source: MAC `[seed; 32]`, AEAD `[!seed; 32]`.
pub fn source_keys(source_id: &str, seed: u8) -> SourceKeys {
    SourceKeys {
        mac_key: MacKey::from_bytes(source_id, vec![seed; 32]).unwrap(),
        aead_key: Some(AeadKey::from_bytes([!seed; 32])),
    }
}

/// Pipeline plus sensor-side sealers sharing a manual clock.
pub struct Harness {
    /// Shared clock; advance it to move time for the pipeline
    pub clock: Arc<ManualClock>,
    /// Pipeline under test
    pub pipeline: Arc<ValidationPipeline>,
    sealers: HashMap<String, TelemetrySealer>,
}

impl Harness {
    /// Pipeline with `config` and keys for `sources` (seeds 1, 2, ...).
    pub fn new(config: PipelineConfig, sources: &[&str]) -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let mut store = StaticKeyStore::new();
        let mut sealers = HashMap::new();
        for (i, source) in sources.iter().enumerate() {
            let seed = u8::try_from(i + 1).unwrap();
            let keys = source_keys(source, seed);
            store.insert(source, keys.clone()).unwrap();
            sealers.insert(
                (*source).to_string(),
                TelemetrySealer::new(*source, Arc::new(keys)),
            );
        }
        let pipeline =
            Arc::new(ValidationPipeline::new(config, Arc::new(store), clock.clone()).unwrap());
        Self {
            clock,
            pipeline,
            sealers,
        }
    }

    /// Default configuration.
    pub fn with_sources(sources: &[&str]) -> Self {
        Self::new(PipelineConfig::default(), sources)
    }

    /// Sealer for a configured source.
    pub fn sealer(&self, source: &str) -> &TelemetrySealer {
        &self.sealers[source]
    }

    /// Signed plaintext reading stamped with the current clock.
    pub fn plain(&self, source: &str, value: f64) -> TelemetryMessage {
        self.sealer(source)
            .plain("temperature", value, Some("C"), self.clock.now())
            .unwrap()
    }

    /// Signed encrypted reading stamped with the current clock.
    pub fn encrypted(&self, source: &str, value: f64) -> TelemetryMessage {
        self.sealer(source)
            .encrypted("humidity", value, Some("%"), self.clock.now())
            .unwrap()
    }

    /// Signed plaintext reading stamped `age` in the past (negative: future).
    pub fn aged(&self, source: &str, age: chrono::Duration) -> TelemetryMessage {
        self.sealer(source)
            .plain("temperature", 1.0, None, self.clock.now() - age)
            .unwrap()
    }

    /// Validate and return only the outcome.
    pub fn validate(&self, message: &TelemetryMessage) -> ValidationOutcome {
        self.pipeline.validate(message).outcome
    }

    /// Advance the clock.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}
