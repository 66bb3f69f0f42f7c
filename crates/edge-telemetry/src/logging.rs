//! Structured logging helpers.
//!
//! Every pipeline log line carries the same core fields so log shippers can
//! index them:
//! - `stage`: pipeline stage (canonicalize, signature, freshness, ...)
//! - `source_id`: emitting sensor
//! - `event_type` / `severity`: for security events

use shared_bus::{SecurityEvent, Severity};

/// Log a security event at the level matching its severity.
pub fn log_security_event(event: &SecurityEvent) {
    let source_id = event.source_id.as_deref().unwrap_or("-");
    let reason = event
        .details
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("-");
    let details = serde_json::to_string(&event.details).unwrap_or_default();

    match event.severity {
        Severity::Debug => tracing::debug!(
            target: "edge::security",
            event_id = %event.event_id,
            event_type = %event.event_type,
            source_id,
            reason,
            details = %details,
            "{}",
            event.message
        ),
        Severity::Info => tracing::info!(
            target: "edge::security",
            event_id = %event.event_id,
            event_type = %event.event_type,
            source_id,
            reason,
            details = %details,
            "{}",
            event.message
        ),
        Severity::Warning => tracing::warn!(
            target: "edge::security",
            event_id = %event.event_id,
            event_type = %event.event_type,
            source_id,
            reason,
            details = %details,
            "{}",
            event.message
        ),
        Severity::Error | Severity::Critical => tracing::error!(
            target: "edge::security",
            event_id = %event.event_id,
            event_type = %event.event_type,
            severity = %event.severity,
            source_id,
            reason,
            details = %details,
            "{}",
            event.message
        ),
    }
}

/// Log a pipeline-stage message with standard fields.
///
/// ```rust,ignore
/// log_stage!(debug, "signature", source_id, "Signature verified");
/// log_stage!(warn, "freshness", source_id, "Replay cache full", evicted = 1);
/// ```
#[macro_export]
macro_rules! log_stage {
    ($level:ident, $stage:expr, $source_id:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            stage = $stage,
            source_id = %$source_id,
            $($($field)*,)?
            $msg
        )
    };
}
