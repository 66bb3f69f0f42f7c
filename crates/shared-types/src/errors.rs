//! # Error Types
//!
//! Defines error types used across crates.

use thiserror::Error;

/// Errors raised while loading or deriving key material.
///
/// These are startup-time failures. A pipeline must not start with
/// incomplete key material for a declared source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Key material is not valid hex.
    #[error("Invalid hex key for source {source_id}: {reason}")]
    InvalidHex { source_id: String, reason: String },

    /// MAC key is shorter than the accepted minimum.
    #[error("MAC key for source {source_id} too short: {actual} bytes, need at least {minimum}")]
    MacKeyTooShort {
        source_id: String,
        actual: usize,
        minimum: usize,
    },

    /// AEAD key has the wrong length.
    #[error("AEAD key for source {source_id} invalid: {reason}")]
    InvalidAeadKey { source_id: String, reason: String },

    /// A source was declared twice.
    #[error("Duplicate key entry for source {0}")]
    DuplicateSource(String),

    /// A source id is empty.
    #[error("Source id must not be empty")]
    EmptySourceId,
}

/// Errors raised while decoding a wire message.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The input is not a JSON object of the expected shape.
    #[error("Invalid telemetry JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
