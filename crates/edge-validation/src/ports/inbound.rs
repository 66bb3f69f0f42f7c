//! # Inbound Ports (Driving Ports / API)
//!
//! The synchronous validation API. Forwarding and event delivery are not
//! part of it; see [`crate::service::EdgeValidationService`] for the async
//! wrapper that does both.

use shared_types::TelemetryMessage;

use crate::config::{ConfigError, PipelineConfig};
use crate::domain::entities::{PipelineStats, ValidationReport};

/// Primary validation API.
///
/// Implementations must be thread-safe (`Send + Sync`) and must never fail
/// for a bad message: every rejection is an outcome, not an error.
pub trait TelemetryValidationApi: Send + Sync {
    /// Run one decoded message through every enabled stage.
    fn validate(&self, message: &TelemetryMessage) -> ValidationReport;

    /// Decode and validate a raw JSON message. Undecodable input is
    /// rejected as `MalformedMessage`.
    fn validate_json(&self, raw: &str) -> ValidationReport;

    /// Counter snapshot.
    fn stats(&self) -> PipelineStats;

    /// Swap in a new configuration snapshot.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the new configuration is invalid; the old one stays.
    fn reconfigure(&self, config: PipelineConfig) -> Result<(), ConfigError>;
}
