//! # Validation Entities
//!
//! Outcome types returned by the pipeline and the stats snapshot.

use serde::Serialize;
use shared_bus::SecurityEvent;
use shared_types::ForwardedTelemetry;
use std::collections::BTreeMap;

use super::errors::{RejectReason, ValidationError};

/// Why and for whom a message was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Single rejection reason
    pub reason: RejectReason,
    /// Human-readable context
    pub detail: String,
    /// Claimed source, when it could be read
    pub source_id: Option<String>,
}

impl Rejection {
    /// Build a rejection from a stage error.
    pub fn from_error(err: &ValidationError, source_id: Option<String>) -> Self {
        Self {
            reason: err.reason(),
            detail: err.to_string(),
            source_id,
        }
    }
}

/// Result of validating one message.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Passed every enabled stage
    Accepted(ForwardedTelemetry),
    /// Dropped by the first failing stage
    Rejected(Rejection),
}

impl ValidationOutcome {
    /// Whether the message was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Rejection reason, if rejected.
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(r) => Some(r.reason),
        }
    }

    /// Forwarded record, if accepted.
    pub fn accepted(&self) -> Option<&ForwardedTelemetry> {
        match self {
            Self::Accepted(t) => Some(t),
            Self::Rejected(_) => None,
        }
    }
}

/// Outcome plus the security events the message produced.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Accept or reject
    pub outcome: ValidationOutcome,
    /// Events to publish, in emission order
    pub events: Vec<SecurityEvent>,
}

/// Point-in-time pipeline counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Messages seen
    pub total: u64,
    /// Messages accepted
    pub accepted: u64,
    /// Rejections by reason
    pub rejected: BTreeMap<RejectReason, u64>,
    /// Distinct sources with at least one accepted message
    pub sources_seen: usize,
    /// Nonces currently held by the replay cache
    pub replay_cache_entries: usize,
    /// Live rate limiter buckets
    pub rate_buckets: usize,
}

impl PipelineStats {
    /// Sum of all rejections.
    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }

    /// Rejections for one reason.
    pub fn rejected_for(&self, reason: RejectReason) -> u64 {
        self.rejected.get(&reason).copied().unwrap_or(0)
    }
}
