//! # Security Events
//!
//! Defines the events the edge emits for rejected messages, notable accepts
//! and delivery problems. Events are published to the bus and consumed by
//! log shippers, alerting and dashboards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Kind of security or processing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // =========================================================================
    // REJECTIONS
    // =========================================================================
    /// Message structurally invalid.
    MalformedMessage,
    /// No key is bound to the claimed source.
    UnknownSource,
    /// HMAC did not verify.
    InvalidSignature,
    /// Timestamp outside the freshness window.
    InvalidTimestamp,
    /// Nonce seen before for this source.
    ReplayAttack,
    /// AEAD payload could not be opened.
    DecryptionFailed,
    /// Source exceeded its rate.
    RateLimitExceeded,

    // =========================================================================
    // ACCEPTS
    // =========================================================================
    /// Sampled accepted message.
    TelemetryProcessed,
    /// First accepted message from a source.
    SourceFirstSeen,

    // =========================================================================
    // DELIVERY & LIFECYCLE
    // =========================================================================
    /// Forwarder failed to deliver a reading.
    CloudSendFailure,
    /// Validation service started.
    SystemStartup,
    /// Validation service stopped.
    SystemShutdown,
}

impl EventType {
    /// Wire name (`snake_case`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedMessage => "malformed_message",
            Self::UnknownSource => "unknown_source",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::ReplayAttack => "replay_attack",
            Self::DecryptionFailed => "decryption_failed",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::TelemetryProcessed => "telemetry_processed",
            Self::SourceFirstSeen => "source_first_seen",
            Self::CloudSendFailure => "cloud_send_failure",
            Self::SystemStartup => "system_startup",
            Self::SystemShutdown => "system_shutdown",
        }
    }

    /// Get the topic for this event type.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::MalformedMessage
            | Self::UnknownSource
            | Self::InvalidSignature
            | Self::InvalidTimestamp
            | Self::ReplayAttack
            | Self::DecryptionFailed => EventTopic::Security,
            Self::RateLimitExceeded => EventTopic::Traffic,
            Self::TelemetryProcessed | Self::SourceFirstSeen => EventTopic::Processing,
            Self::CloudSendFailure => EventTopic::Delivery,
            Self::SystemStartup | Self::SystemShutdown => EventTopic::Lifecycle,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Diagnostic detail.
    Debug,
    /// Normal operation.
    Info,
    /// Suspicious or degraded.
    Warning,
    /// Security violation.
    Error,
    /// Requires operator attention.
    Critical,
}

impl Severity {
    /// Wire name (`snake_case`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A security-relevant occurrence observed by the edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Unique event id.
    pub event_id: Uuid,
    /// What happened.
    pub event_type: EventType,
    /// How bad it is.
    pub severity: Severity,
    /// When the edge observed it.
    pub timestamp: DateTime<Utc>,
    /// Source the event concerns, if known.
    pub source_id: Option<String>,
    /// Human-readable summary.
    pub message: String,
    /// Structured context (reason, nonce, counters...).
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl SecurityEvent {
    /// Create a new event stamped with the current time.
    #[must_use]
    pub fn new(event_type: EventType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            severity,
            timestamp: Utc::now(),
            source_id: None,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach the source id.
    #[must_use]
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Override the observation time.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach one detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        self.event_type.topic()
    }
}

/// Event topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Authentication, freshness and decryption failures.
    Security,
    /// Rate limiting.
    Traffic,
    /// Accepted telemetry.
    Processing,
    /// Cloud forwarding outcomes.
    Delivery,
    /// Service start and stop.
    Lifecycle,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Sources to include. Empty means all sources.
    pub sources: Vec<String>,
    /// Lowest severity to include. `None` means all severities.
    pub min_severity: Option<Severity>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            ..Self::default()
        }
    }

    /// Create a filter for events about specific sources.
    #[must_use]
    pub fn from_sources(sources: Vec<String>) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }

    /// Restrict to events at or above `severity`.
    #[must_use]
    pub fn at_least(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &SecurityEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let source_match = self.sources.is_empty()
            || event
                .source_id
                .as_ref()
                .is_some_and(|s| self.sources.contains(s));

        let severity_match = self.min_severity.map_or(true, |min| event.severity >= min);

        topic_match && source_match && severity_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replay(source: &str) -> SecurityEvent {
        SecurityEvent::new(EventType::ReplayAttack, Severity::Error, "replay").with_source(source)
    }

    #[test]
    fn test_event_topic_mapping() {
        assert_eq!(replay("s1").topic(), EventTopic::Security);
        assert_eq!(EventType::RateLimitExceeded.topic(), EventTopic::Traffic);
        assert_eq!(EventType::SourceFirstSeen.topic(), EventTopic::Processing);
        assert_eq!(EventType::CloudSendFailure.topic(), EventTopic::Delivery);
    }

    #[test]
    fn test_filter_all() {
        assert!(EventFilter::all().matches(&replay("s1")));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Traffic]);
        assert!(!filter.matches(&replay("s1")));

        let limited = SecurityEvent::new(EventType::RateLimitExceeded, Severity::Warning, "slow down");
        assert!(filter.matches(&limited));
    }

    #[test]
    fn test_filter_by_source() {
        let filter = EventFilter::from_sources(vec!["s1".into()]);
        assert!(filter.matches(&replay("s1")));
        assert!(!filter.matches(&replay("s2")));

        let anonymous = SecurityEvent::new(EventType::MalformedMessage, Severity::Warning, "bad");
        assert!(!filter.matches(&anonymous));
    }

    #[test]
    fn test_filter_by_severity() {
        let filter = EventFilter::all().at_least(Severity::Error);
        assert!(filter.matches(&replay("s1")));

        let info = SecurityEvent::new(EventType::TelemetryProcessed, Severity::Info, "ok");
        assert!(!filter.matches(&info));
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let event = replay("s1").with_detail("reason", "replay_detected");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event_type"], "replay_attack");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["source_id"], "s1");
        assert_eq!(json["details"]["reason"], "replay_detected");
    }

    #[test]
    fn test_as_str_matches_serde() {
        for t in [EventType::CloudSendFailure, EventType::InvalidTimestamp] {
            let json = serde_json::to_value(t).unwrap();
            assert_eq!(json, t.as_str());
        }
    }
}
