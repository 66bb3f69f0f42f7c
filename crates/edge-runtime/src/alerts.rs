//! # Alert Relay
//!
//! Follows the security event bus and writes every event at or above a
//! severity as one JSON line, for an operator console or a log shipper.
//!
//! The relay ends once every handle to the bus is dropped, after writing
//! whatever was still buffered.

use shared_bus::{EventFilter, EventStream, InMemoryEventBus, SecurityEvent, Severity};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_stream::StreamExt;
use tracing::debug;

/// Lowest severity relayed by the `validate` command.
pub const DEFAULT_ALERT_SEVERITY: Severity = Severity::Error;

/// Filter selecting alert-worthy events.
#[must_use]
pub fn alert_filter(min_severity: Severity) -> EventFilter {
    EventFilter::all().at_least(min_severity)
}

/// Subscribe to alerts. Events published before this call are not seen.
#[must_use]
pub fn subscribe_alerts(bus: &InMemoryEventBus, min_severity: Severity) -> EventStream {
    bus.event_stream(alert_filter(min_severity))
}

/// Most recent alerts still in the bus history, oldest first.
#[must_use]
pub fn recent_alerts(bus: &InMemoryEventBus, min_severity: Severity, limit: usize) -> Vec<SecurityEvent> {
    bus.recent(&alert_filter(min_severity), limit)
}

/// Write each alert to `out` until the bus closes. Returns the number written.
pub async fn relay_alerts<W>(mut alerts: EventStream, mut out: W) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut relayed = 0u64;
    while let Some(event) = alerts.next().await {
        let mut line = serde_json::to_vec(&event).map_err(std::io::Error::other)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        relayed += 1;
    }
    out.flush().await?;
    debug!(relayed, "Alert stream closed");
    Ok(relayed)
}
