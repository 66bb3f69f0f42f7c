//! # Logging Adapters
//!
//! `TracingEventSink` writes every event to the log at its severity;
//! `CompositeSink` fans one event out to several sinks.

use async_trait::async_trait;
use edge_telemetry::log_security_event;
use shared_bus::SecurityEvent;
use std::sync::Arc;

use crate::ports::outbound::SecurityEventSink;

/// Logs each event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl SecurityEventSink for TracingEventSink {
    async fn emit(&self, event: SecurityEvent) {
        log_security_event(&event);
    }
}

/// Delivers each event to every inner sink, in order.
#[derive(Clone, Default)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn SecurityEventSink>>,
}

impl CompositeSink {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of inner sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no inner sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl SecurityEventSink for CompositeSink {
    async fn emit(&self, event: SecurityEvent) {
        let Some((last, rest)) = self.sinks.split_last() else {
            return;
        };
        for sink in rest {
            sink.emit(event.clone()).await;
        }
        last.emit(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::BusEventSink;
    use shared_bus::{EventType, InMemoryEventBus, Severity};

    #[tokio::test]
    async fn test_composite_fans_out() {
        let bus_a = Arc::new(InMemoryEventBus::new());
        let bus_b = Arc::new(InMemoryEventBus::new());
        let sink = CompositeSink::new()
            .with(Arc::new(TracingEventSink))
            .with(Arc::new(BusEventSink::new(Arc::clone(&bus_a))))
            .with(Arc::new(BusEventSink::new(Arc::clone(&bus_b))));
        assert_eq!(sink.len(), 3);

        sink.emit(SecurityEvent::new(
            EventType::ReplayAttack,
            Severity::Error,
            "replay",
        ))
        .await;

        assert_eq!(bus_a.count_of(EventType::ReplayAttack), 1);
        assert_eq!(bus_b.count_of(EventType::ReplayAttack), 1);
    }

    #[tokio::test]
    async fn test_empty_composite_is_noop() {
        let sink = CompositeSink::new();
        assert!(sink.is_empty());
        sink.emit(SecurityEvent::new(EventType::SystemStartup, Severity::Info, "up"))
            .await;
    }
}
