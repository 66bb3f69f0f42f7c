//! # Event Bus Adapter
//!
//! Publishes security events to the shared in-memory bus, where alerting,
//! dashboards and tests subscribe to them.

use async_trait::async_trait;
use shared_bus::{EventPublisher, InMemoryEventBus, SecurityEvent};
use std::sync::Arc;
use tracing::trace;

use crate::ports::outbound::SecurityEventSink;

/// [`SecurityEventSink`] backed by an [`InMemoryEventBus`].
#[derive(Clone)]
pub struct BusEventSink {
    bus: Arc<InMemoryEventBus>,
}

impl BusEventSink {
    /// Wrap a bus.
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self { bus }
    }

    /// The underlying bus.
    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }
}

#[async_trait]
impl SecurityEventSink for BusEventSink {
    async fn emit(&self, event: SecurityEvent) {
        let event_type = event.event_type;
        let receivers = self.bus.publish(event).await;
        trace!(event_type = %event_type, receivers, "Security event published to bus");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::{EventFilter, EventType, Severity};

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let sink = BusEventSink::new(Arc::clone(&bus));

        sink.emit(SecurityEvent::new(
            EventType::InvalidSignature,
            Severity::Error,
            "bad tag",
        ))
        .await;

        let received = sub.try_recv().unwrap().expect("event");
        assert_eq!(received.event_type, EventType::InvalidSignature);
        assert_eq!(sink.bus().events_published(), 1);
    }
}
