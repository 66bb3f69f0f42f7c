//! # Seal Command
//!
//! Builds signed readings for a configured source, the way a sensor would.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use edge_validation::{SealError, TelemetrySealer};
use shared_types::{KeyProvider, TelemetryMessage};
use thiserror::Error;

/// What to seal.
#[derive(Debug, Clone, PartialEq)]
pub struct SealRequest {
    /// Source to sign for
    pub source: String,
    /// Reading kind
    pub kind: String,
    /// Reading value, rounded to 6 decimal places when sealed
    pub value: f64,
    /// Unit of the value
    pub unit: Option<String>,
    /// Encrypt the reading
    pub encrypt: bool,
    /// Number of messages, each with its own nonce
    pub count: u32,
    /// Seconds to backdate the timestamp by; negative dates it forward
    pub age_secs: i64,
}

/// Errors from the seal command.
#[derive(Debug, Error)]
pub enum SealCommandError {
    /// No keys for the requested source
    #[error("No keys configured for source {0}")]
    UnknownSource(String),

    /// Backdating leaves the representable time range
    #[error("Age of {0}s is out of range")]
    AgeOutOfRange(i64),

    /// Building a message failed
    #[error(transparent)]
    Seal(#[from] SealError),
}

/// `now` moved back by `age_secs`, if representable.
pub fn backdate(now: DateTime<Utc>, age_secs: i64) -> Result<DateTime<Utc>, SealCommandError> {
    ChronoDuration::try_seconds(age_secs)
        .and_then(|age| now.checked_sub_signed(age))
        .ok_or(SealCommandError::AgeOutOfRange(age_secs))
}

/// Seal `request.count` messages stamped `now - age_secs`.
pub fn seal_batch<K>(
    keys: &K,
    request: &SealRequest,
    now: DateTime<Utc>,
) -> Result<Vec<TelemetryMessage>, SealCommandError>
where
    K: KeyProvider + ?Sized,
{
    let source_keys = keys
        .keys_for(&request.source)
        .ok_or_else(|| SealCommandError::UnknownSource(request.source.clone()))?;
    let timestamp = backdate(now, request.age_secs)?;
    let sealer = TelemetrySealer::new(request.source.as_str(), source_keys);
    let unit = request.unit.as_deref();

    (0..request.count)
        .map(|_| -> Result<TelemetryMessage, SealCommandError> {
            let message = if request.encrypt {
                sealer.encrypted(&request.kind, request.value, unit, timestamp)?
            } else {
                sealer.plain(&request.kind, request.value, unit, timestamp)?
            };
            Ok(message)
        })
        .collect()
}
