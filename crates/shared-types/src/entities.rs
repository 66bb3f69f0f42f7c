//! # Telemetry Entities
//!
//! Defines the wire shape of a sensor message and the record handed to the
//! cloud forwarder once a message is accepted.
//!
//! ## Wire Keys
//!
//! | Field | Wire key | Accepted alias |
//! |-------|----------|----------------|
//! | `source_id` | `sensor_id` | `source_id` |
//! | `timestamp` | `ts` | `timestamp` |
//! | `kind` | `type` | `kind` |
//! | `encrypted` | `enc` | `encrypted` |
//! | `payload` | `encrypted_data` | `payload` |
//! | `signature` | `sig` | `signature` |
//! | `schema_version` | `ver` | `schema_version` |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

use crate::errors::DecodeError;

/// The only schema version this workspace understands.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// INBOUND
// =============================================================================

/// A telemetry message as received from the broker.
///
/// Every field is optional at this layer. Presence and semantic type are
/// enforced by the canonicalizer, which rejects incomplete messages as
/// malformed instead of failing deserialization.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    /// Emitting sensor. Keys, buckets and caches are bound to it.
    #[serde(rename = "sensor_id", alias = "source_id", default)]
    pub source_id: Option<String>,

    /// RFC 3339 instant with an explicit offset.
    #[serde(rename = "ts", alias = "timestamp", default)]
    pub timestamp: Option<String>,

    /// Reading type tag, passed through untouched.
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: Option<String>,

    /// Plaintext numeric reading. Kept as raw JSON so that a non-numeric
    /// value is reported as malformed.
    #[serde(default)]
    pub value: Option<serde_json::Value>,

    /// Unit of the reading.
    #[serde(default)]
    pub unit: Option<String>,

    /// Single-use UUID.
    #[serde(default)]
    pub nonce: Option<String>,

    /// Selects between `value` and `payload`.
    #[serde(rename = "enc", alias = "encrypted", default)]
    pub encrypted: Option<bool>,

    /// AEAD-sealed reading.
    #[serde(rename = "encrypted_data", alias = "payload", default)]
    pub payload: Option<EncryptedPayload>,

    /// Base64 HMAC-SHA256 over the canonical form.
    #[serde(rename = "sig", alias = "signature", default)]
    pub signature: Option<String>,

    /// Wire schema version.
    #[serde(rename = "ver", alias = "schema_version", default)]
    pub schema_version: Option<u32>,
}

impl TelemetryMessage {
    /// Decodes a message from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Json` if the input is not a JSON object or a
    /// field has a type serde cannot coerce (e.g. `ver` as a string).
    pub fn from_json(input: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Encodes the message using the wire keys.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, DecodeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Source id for logging, even when the message is malformed.
    pub fn source_label(&self) -> &str {
        self.source_id.as_deref().unwrap_or("<unknown>")
    }
}

/// Ciphertext and IV of an encrypted reading, both base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// 12-byte AES-GCM IV. Distinct from the message replay nonce.
    #[serde(rename = "nonce", alias = "iv")]
    pub iv: String,

    /// Ciphertext with the 16-byte tag appended.
    pub ciphertext: String,
}

/// Plaintext carried inside an [`EncryptedPayload`].
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealedReading {
    /// Numeric reading.
    pub value: f64,
    /// Unit of the reading, when the sensor sends one inside the envelope.
    #[serde(default)]
    pub unit: Option<String>,
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// An accepted reading, ready for cloud ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardedTelemetry {
    /// Emitting sensor.
    pub source_id: String,
    /// Reading type tag.
    pub kind: String,
    /// Reading. `None` when an encrypted message passed with decryption off.
    pub value: Option<f64>,
    /// Unit of the reading.
    pub unit: Option<String>,
    /// Sensor-side timestamp.
    pub timestamp: DateTime<Utc>,
    /// Replay nonce of the original message.
    pub nonce: Uuid,
    /// Whether the value came out of an AEAD payload.
    pub decrypted: bool,
    /// When the edge accepted the message.
    pub processed_at: DateTime<Utc>,
}
