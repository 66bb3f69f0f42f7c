//! # Validation Errors
//!
//! Per-message failures. None of these are faults: the pipeline turns every
//! one of them into a `Rejected` outcome and a security event.

use serde::{Deserialize, Serialize};
use shared_bus::{EventType, Severity};
use std::fmt;
use thiserror::Error;

/// Why a message was rejected. Exactly one per rejected message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Required field absent or of the wrong semantic type
    MalformedMessage,
    /// No key bound to the claimed source
    UnknownSource,
    /// HMAC missing, undecodable or not matching
    InvalidSignature,
    /// Timestamp outside `[now - W, now + W]`
    StaleOrFutureTimestamp,
    /// Nonce already seen for this source
    ReplayDetected,
    /// AEAD payload could not be opened
    DecryptionFailed,
    /// Source exceeded its rate
    RateLimitExceeded,
}

impl RejectReason {
    /// Number of reasons.
    pub const COUNT: usize = 7;

    /// Every reason, in pipeline stage order.
    pub const ALL: [RejectReason; Self::COUNT] = [
        Self::MalformedMessage,
        Self::UnknownSource,
        Self::InvalidSignature,
        Self::StaleOrFutureTimestamp,
        Self::ReplayDetected,
        Self::DecryptionFailed,
        Self::RateLimitExceeded,
    ];

    /// Stable `snake_case` name, used as metric label and event detail.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedMessage => "malformed_message",
            Self::UnknownSource => "unknown_source",
            Self::InvalidSignature => "invalid_signature",
            Self::StaleOrFutureTimestamp => "stale_or_future_timestamp",
            Self::ReplayDetected => "replay_detected",
            Self::DecryptionFailed => "decryption_failed",
            Self::RateLimitExceeded => "rate_limit_exceeded",
        }
    }

    /// Event type emitted for this rejection.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::MalformedMessage => EventType::MalformedMessage,
            Self::UnknownSource => EventType::UnknownSource,
            Self::InvalidSignature => EventType::InvalidSignature,
            Self::StaleOrFutureTimestamp => EventType::InvalidTimestamp,
            Self::ReplayDetected => EventType::ReplayAttack,
            Self::DecryptionFailed => EventType::DecryptionFailed,
            Self::RateLimitExceeded => EventType::RateLimitExceeded,
        }
    }

    /// Severity of the emitted event.
    ///
    /// Decryption failures after a valid signature point at local key
    /// misconfiguration rather than an attacker, hence warning.
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownSource | Self::InvalidSignature | Self::ReplayDetected => Severity::Error,
            Self::MalformedMessage
            | Self::StaleOrFutureTimestamp
            | Self::DecryptionFailed
            | Self::RateLimitExceeded => Severity::Warning,
        }
    }

    /// Position in [`RejectReason::ALL`].
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage failure with the context needed for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Structural problem found by the canonicalizer
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// No key bound to the source
    #[error("No key bound to source {0}")]
    UnknownSource(String),

    /// Signature did not verify
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Timestamp outside the freshness window
    #[error("Timestamp {timestamp} outside window [{earliest}, {latest}]")]
    StaleOrFutureTimestamp {
        /// Normalized message timestamp
        timestamp: String,
        /// Oldest accepted instant
        earliest: String,
        /// Newest accepted instant
        latest: String,
    },

    /// Nonce reuse
    #[error("Nonce {nonce} already seen for source {source_id}")]
    ReplayDetected {
        /// Source the nonce belongs to
        source_id: String,
        /// Reused nonce
        nonce: String,
    },

    /// AEAD payload could not be opened
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Rate limit hit
    #[error("Rate limit exceeded for {source_id}, retry in {retry_after_ms} ms")]
    RateLimitExceeded {
        /// Limited source
        source_id: String,
        /// Time until the next message would be admitted
        retry_after_ms: u64,
    },
}

impl ValidationError {
    /// The rejection reason this error maps to.
    pub fn reason(&self) -> RejectReason {
        match self {
            Self::Malformed(_) => RejectReason::MalformedMessage,
            Self::UnknownSource(_) => RejectReason::UnknownSource,
            Self::InvalidSignature(_) => RejectReason::InvalidSignature,
            Self::StaleOrFutureTimestamp { .. } => RejectReason::StaleOrFutureTimestamp,
            Self::ReplayDetected { .. } => RejectReason::ReplayDetected,
            Self::DecryptionFailed(_) => RejectReason::DecryptionFailed,
            Self::RateLimitExceeded { .. } => RejectReason::RateLimitExceeded,
        }
    }
}
