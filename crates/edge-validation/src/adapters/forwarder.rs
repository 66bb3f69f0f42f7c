//! # Channel Forwarder
//!
//! Hands accepted telemetry to an mpsc channel. The receiving end is the
//! cloud uploader (or, in the runtime, the stdout writer).

use async_trait::async_trait;
use shared_types::ForwardedTelemetry;
use tokio::sync::mpsc;

use crate::ports::outbound::{ForwardError, TelemetryForwarder};

/// [`TelemetryForwarder`] writing to a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelForwarder {
    sender: mpsc::Sender<ForwardedTelemetry>,
}

impl ChannelForwarder {
    /// Create a forwarder and the receiver it feeds.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ForwardedTelemetry>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TelemetryForwarder for ChannelForwarder {
    async fn forward(&self, telemetry: ForwardedTelemetry) -> Result<(), ForwardError> {
        self.sender
            .send(telemetry)
            .await
            .map_err(|_| ForwardError::Closed)
    }
}
