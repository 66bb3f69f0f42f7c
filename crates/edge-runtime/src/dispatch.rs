//! # Source Dispatcher
//!
//! Fans inbound messages out to one async lane per source. Messages of one
//! source are validated in arrival order; different sources run in parallel.
//!
//! ```text
//! lines ──→ decode ──┬──→ lane "temp-01"     ──→ service.process
//!                    ├──→ lane "humidity-01" ──→ service.process
//!                    ├──→ lane "*overflow*"  (past max_lanes)
//!                    └──→ undecodable: processed inline (malformed)
//! ```

use edge_validation::{EdgeValidationService, SecurityEventSink, TelemetryForwarder};
use shared_types::TelemetryMessage;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::container::DispatchConfig;

/// Lane shared by sources that arrive after `max_lanes` is reached.
pub const OVERFLOW_LANE: &str = "*overflow*";

/// Dispatch errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A lane task ended while messages were still being sent to it
    #[error("Lane for {0} is closed")]
    LaneClosed(String),

    /// Reading input failed
    #[error("Input error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters reported by a lane when it drains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaneReport {
    /// Lane key (source id or [`OVERFLOW_LANE`])
    pub lane: String,
    /// Messages validated
    pub processed: u64,
    /// Messages accepted
    pub accepted: u64,
}

/// Per-source dispatcher over a shared validation service.
pub struct SourceDispatcher<F, S>
where
    F: TelemetryForwarder + 'static,
    S: SecurityEventSink + 'static,
{
    service: Arc<EdgeValidationService<F, S>>,
    config: DispatchConfig,
    lanes: HashMap<String, mpsc::Sender<TelemetryMessage>>,
    tasks: JoinSet<LaneReport>,
    inline_rejected: u64,
}

impl<F, S> SourceDispatcher<F, S>
where
    F: TelemetryForwarder + 'static,
    S: SecurityEventSink + 'static,
{
    /// Create a dispatcher. Must be called inside a tokio runtime.
    pub fn new(service: Arc<EdgeValidationService<F, S>>, config: DispatchConfig) -> Self {
        Self {
            service,
            config,
            lanes: HashMap::new(),
            tasks: JoinSet::new(),
            inline_rejected: 0,
        }
    }

    /// Number of open lanes.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Messages rejected before reaching a lane.
    pub fn inline_rejected(&self) -> u64 {
        self.inline_rejected
    }

    /// Route one raw JSON message.
    ///
    /// Waits when the target lane is full.
    pub async fn dispatch(&mut self, raw: &str) -> Result<(), DispatchError> {
        let message = match TelemetryMessage::from_json(raw) {
            Ok(message) => message,
            Err(_) => {
                // No source id to route on; the pipeline reports it malformed.
                self.service.process_json(raw).await;
                self.inline_rejected += 1;
                return Ok(());
            }
        };
        self.dispatch_message(message).await
    }

    /// Route one decoded message.
    pub async fn dispatch_message(&mut self, message: TelemetryMessage) -> Result<(), DispatchError> {
        let key = self.lane_key(message.source_label());
        let sender = self.lane(&key);
        sender
            .send(message)
            .await
            .map_err(|_| DispatchError::LaneClosed(key))
    }

    /// Dispatch every non-blank line of `reader`. Returns the line count.
    pub async fn run_lines<R>(&mut self, reader: R) -> Result<u64, DispatchError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut count = 0u64;
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.dispatch(line).await?;
            count += 1;
        }
        debug!(lines = count, lanes = self.lanes.len(), "Input exhausted");
        Ok(count)
    }

    /// Close every lane and wait for queued messages to finish.
    pub async fn finish(mut self) -> Vec<LaneReport> {
        self.lanes.clear();
        let mut reports = Vec::new();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "Lane task failed"),
            }
        }
        reports.sort_by(|a, b| a.lane.cmp(&b.lane));
        reports
    }

    fn lane_key(&self, source: &str) -> String {
        if self.lanes.contains_key(source) || self.lanes.len() < self.config.max_lanes {
            source.to_string()
        } else {
            OVERFLOW_LANE.to_string()
        }
    }

    fn lane(&mut self, key: &str) -> mpsc::Sender<TelemetryMessage> {
        if let Some(sender) = self.lanes.get(key) {
            return sender.clone();
        }
        let (sender, receiver) = mpsc::channel(self.config.lane_capacity.max(1));
        self.tasks.spawn(run_lane(
            key.to_string(),
            receiver,
            Arc::clone(&self.service),
        ));
        debug!(lane = key, "Lane opened");
        self.lanes.insert(key.to_string(), sender.clone());
        sender
    }
}

async fn run_lane<F, S>(
    lane: String,
    mut receiver: mpsc::Receiver<TelemetryMessage>,
    service: Arc<EdgeValidationService<F, S>>,
) -> LaneReport
where
    F: TelemetryForwarder,
    S: SecurityEventSink,
{
    let mut report = LaneReport {
        lane,
        ..LaneReport::default()
    };
    while let Some(message) = receiver.recv().await {
        let outcome = service.process(&message).await;
        report.processed += 1;
        if outcome.is_accepted() {
            report.accepted += 1;
        }
    }
    debug!(
        lane = %report.lane,
        processed = report.processed,
        accepted = report.accepted,
        "Lane drained"
    );
    report
}
