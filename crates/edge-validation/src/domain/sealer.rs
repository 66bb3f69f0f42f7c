//! # Telemetry Sealer
//!
//! Sensor-side counterpart of the pipeline: builds messages that the
//! pipeline accepts, optionally encrypting the reading first. Used by the
//! runtime's `seal` command and throughout the tests.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use shared_crypto::CryptoError;
use shared_types::{
    sign_hmac, SealedReading, SourceKeys, TelemetryMessage, CURRENT_SCHEMA_VERSION,
};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::canonical::{canonicalize, quantize};
use super::confidentiality::seal_reading;
use super::errors::ValidationError;

/// Errors while building a message.
#[derive(Debug, Error)]
pub enum SealError {
    /// The message would not canonicalize
    #[error("Message is not canonicalizable: {0}")]
    Canonical(#[from] ValidationError),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    Crypto(#[from] CryptoError),

    /// Encryption requested but the source has no AEAD key
    #[error("Source {0} has no AEAD key")]
    MissingAeadKey(String),
}

/// Builds signed telemetry for one source.
#[derive(Debug, Clone)]
pub struct TelemetrySealer {
    source_id: String,
    keys: Arc<SourceKeys>,
}

impl TelemetrySealer {
    /// Create a sealer for `source_id`.
    pub fn new(source_id: impl Into<String>, keys: Arc<SourceKeys>) -> Self {
        Self {
            source_id: source_id.into(),
            keys,
        }
    }

    /// Source this sealer signs for.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Build a signed plaintext message with a fresh nonce.
    ///
    /// The value is rounded to 6 decimal places, the precision the
    /// signature covers.
    pub fn plain(
        &self,
        kind: &str,
        value: f64,
        unit: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<TelemetryMessage, SealError> {
        let mut msg = self.skeleton(kind, unit, timestamp);
        msg.encrypted = Some(false);
        msg.value = Some(serde_json::json!(quantize(value)));
        self.sign(&mut msg)?;
        Ok(msg)
    }

    /// Build a signed message whose reading is AEAD-encrypted.
    ///
    /// The unit travels inside the ciphertext; the outer `unit` is left unset.
    pub fn encrypted(
        &self,
        kind: &str,
        value: f64,
        unit: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<TelemetryMessage, SealError> {
        let key = self
            .keys
            .aead_key
            .as_ref()
            .ok_or_else(|| SealError::MissingAeadKey(self.source_id.clone()))?;

        let nonce = Uuid::new_v4();
        let reading = SealedReading {
            value,
            unit: unit.map(str::to_string),
        };
        let payload = seal_reading(key, &self.source_id, &nonce, &reading)?;

        let mut msg = self.skeleton(kind, None, timestamp);
        msg.nonce = Some(nonce.hyphenated().to_string());
        msg.encrypted = Some(true);
        msg.payload = Some(payload);
        self.sign(&mut msg)?;
        Ok(msg)
    }

    /// (Re)compute the signature over the current content of `msg`.
    pub fn sign(&self, msg: &mut TelemetryMessage) -> Result<(), SealError> {
        let canonical = canonicalize(msg)?;
        let tag = sign_hmac(canonical.bytes(), &self.keys.mac_key);
        msg.signature = Some(BASE64.encode(tag));
        Ok(())
    }

    fn skeleton(&self, kind: &str, unit: Option<&str>, timestamp: DateTime<Utc>) -> TelemetryMessage {
        TelemetryMessage {
            source_id: Some(self.source_id.clone()),
            timestamp: Some(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
            kind: Some(kind.to_string()),
            unit: unit.map(str::to_string),
            nonce: Some(Uuid::new_v4().hyphenated().to_string()),
            schema_version: Some(CURRENT_SCHEMA_VERSION),
            ..TelemetryMessage::default()
        }
    }
}
