//! # Canonicalizer
//!
//! Turns a wire message (minus its signature) into the exact bytes that get
//! signed, and into a typed view the later stages consume.
//!
//! ## Encoding
//!
//! A JSON array in fixed field order, prefixed by a domain tag:
//!
//! ```text
//! ["telemetry/v1", "<ver>", "<source_id>", "<ts, UTC, RFC 3339, µs>", "<kind>",
//!  "plain"|"sealed", "<value, 6 dp>"|null, "<unit>"|null,
//!  "<iv b64>"|null, "<ciphertext b64>"|null, "<nonce, lowercase hyphenated>"]
//! ```
//!
//! JSON string escaping makes the encoding unambiguous, and `null` keeps an
//! absent unit distinct from an empty one.
//!
//! The encoded form must carry every bit the later stages use, so values
//! that do not survive the 6 dp rendering and timestamps with sub-microsecond
//! digits are rejected instead of being silently truncated.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use shared_types::{TelemetryMessage, CURRENT_SCHEMA_VERSION};
use uuid::Uuid;

use super::errors::ValidationError;

/// Domain separation tag, first element of every canonical form.
pub const CANONICAL_TAG: &str = "telemetry/v1";

/// Longest accepted source id.
pub const MAX_SOURCE_ID_LEN: usize = 128;

/// The reading carried by a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Plaintext value.
    Plain(f64),
    /// AEAD payload, decoded from base64.
    Sealed {
        /// AES-GCM IV
        iv: Vec<u8>,
        /// Ciphertext with tag
        ciphertext: Vec<u8>,
    },
}

impl Reading {
    /// Whether the reading is encrypted.
    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed { .. })
    }
}

/// A structurally valid message and its signable bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMessage {
    /// Emitting sensor
    pub source_id: String,
    /// Sensor timestamp, UTC
    pub timestamp: DateTime<Utc>,
    /// Reading type tag
    pub kind: String,
    /// Plain or sealed reading
    pub reading: Reading,
    /// Unit, when sent
    pub unit: Option<String>,
    /// Replay nonce
    pub nonce: Uuid,
    bytes: Vec<u8>,
}

impl CanonicalMessage {
    /// Bytes covered by the signature.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Canonicalize a message.
///
/// Pure: the same input yields the same bytes on every call and every run.
///
/// # Errors
///
/// Returns `ValidationError::Malformed` naming the first offending field.
pub fn canonicalize(msg: &TelemetryMessage) -> Result<CanonicalMessage, ValidationError> {
    let version = match msg.schema_version {
        Some(v) if v == CURRENT_SCHEMA_VERSION => v,
        Some(v) => return Err(malformed(format!("unsupported schema version {v}"))),
        None => return Err(malformed("missing field 'ver'")),
    };

    let source_id = parse_source_id(msg.source_id.as_deref())?;
    let timestamp = parse_timestamp(msg.timestamp.as_deref())?;
    let kind = match msg.kind.as_deref() {
        Some(k) if !k.trim().is_empty() => k.to_string(),
        Some(_) => return Err(malformed("field 'type' is empty")),
        None => return Err(malformed("missing field 'type'")),
    };
    let nonce = parse_nonce(msg.nonce.as_deref())?;
    let reading = parse_reading(msg)?;

    let ts_text = timestamp.to_rfc3339_opts(SecondsFormat::Micros, true);
    let (mode, value, iv, ciphertext) = match &reading {
        Reading::Plain(v) => (
            "plain",
            Value::String(format!("{v:.6}")),
            Value::Null,
            Value::Null,
        ),
        Reading::Sealed { iv, ciphertext } => (
            "sealed",
            Value::Null,
            Value::String(BASE64.encode(iv)),
            Value::String(BASE64.encode(ciphertext)),
        ),
    };
    let unit = msg
        .unit
        .as_ref()
        .map_or(Value::Null, |u| Value::String(u.clone()));

    let fields = vec![
        Value::String(CANONICAL_TAG.to_string()),
        Value::String(version.to_string()),
        Value::String(source_id.clone()),
        Value::String(ts_text),
        Value::String(kind.clone()),
        Value::String(mode.to_string()),
        value,
        unit,
        iv,
        ciphertext,
        Value::String(nonce.hyphenated().to_string()),
    ];
    let bytes = serde_json::to_vec(&fields)
        .map_err(|e| malformed(format!("canonical encoding failed: {e}")))?;

    Ok(CanonicalMessage {
        source_id,
        timestamp,
        kind,
        reading,
        unit: msg.unit.clone(),
        nonce,
        bytes,
    })
}

/// Round a reading to the precision the canonical form carries.
///
/// Values returned by this function always pass the precision check in
/// [`canonicalize`].
pub fn quantize(value: f64) -> f64 {
    format!("{value:.6}").parse().unwrap_or(f64::NAN)
}

fn malformed(detail: impl Into<String>) -> ValidationError {
    ValidationError::Malformed(detail.into())
}

fn parse_source_id(raw: Option<&str>) -> Result<String, ValidationError> {
    let id = raw.ok_or_else(|| malformed("missing field 'sensor_id'"))?;
    if id.is_empty() {
        return Err(malformed("field 'sensor_id' is empty"));
    }
    if id.len() > MAX_SOURCE_ID_LEN {
        return Err(malformed(format!(
            "field 'sensor_id' longer than {MAX_SOURCE_ID_LEN} bytes"
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(malformed("field 'sensor_id' contains control characters"));
    }
    Ok(id.to_string())
}

/// Parse an RFC 3339 timestamp. An explicit offset (`Z` or `±hh:mm`) is
/// required so the instant is unambiguous.
pub fn parse_timestamp(raw: Option<&str>) -> Result<DateTime<Utc>, ValidationError> {
    let text = raw.ok_or_else(|| malformed("missing field 'ts'"))?;
    let timestamp = DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| malformed(format!("field 'ts' is not an RFC 3339 instant: {e}")))?;
    if timestamp.timestamp_subsec_nanos() % 1_000 != 0 {
        return Err(malformed("field 'ts' is more precise than microseconds"));
    }
    Ok(timestamp)
}

fn parse_nonce(raw: Option<&str>) -> Result<Uuid, ValidationError> {
    let text = raw.ok_or_else(|| malformed("missing field 'nonce'"))?;
    let nonce = Uuid::parse_str(text.trim())
        .map_err(|e| malformed(format!("field 'nonce' is not a UUID: {e}")))?;
    if nonce.is_nil() {
        return Err(malformed("field 'nonce' is the nil UUID"));
    }
    Ok(nonce)
}

fn parse_reading(msg: &TelemetryMessage) -> Result<Reading, ValidationError> {
    let encrypted = msg.encrypted.unwrap_or(false);

    match (encrypted, &msg.value, &msg.payload) {
        (false, Some(value), None) => {
            let v = value
                .as_f64()
                .ok_or_else(|| malformed("field 'value' is not a number"))?;
            if !v.is_finite() {
                return Err(malformed("field 'value' is not finite"));
            }
            if quantize(v).to_bits() != v.to_bits() {
                return Err(malformed("field 'value' is more precise than 6 decimal places"));
            }
            Ok(Reading::Plain(v))
        }
        (true, None, Some(payload)) => {
            let iv = BASE64
                .decode(payload.iv.trim())
                .map_err(|e| malformed(format!("field 'encrypted_data.nonce' is not base64: {e}")))?;
            let ciphertext = BASE64.decode(payload.ciphertext.trim()).map_err(|e| {
                malformed(format!(
                    "field 'encrypted_data.ciphertext' is not base64: {e}"
                ))
            })?;
            Ok(Reading::Sealed { iv, ciphertext })
        }
        (false, None, _) => Err(malformed("plaintext message without 'value'")),
        (false, Some(_), Some(_)) => Err(malformed(
            "plaintext message carries 'encrypted_data'",
        )),
        (true, _, None) => Err(malformed("encrypted message without 'encrypted_data'")),
        (true, Some(_), Some(_)) => Err(malformed("encrypted message carries 'value'")),
    }
}
