//! # Event Publisher
//!
//! Defines the publishing side of the security event bus.

use crate::events::{EventFilter, EventType, SecurityEvent};
use crate::subscriber::{EventStream, Subscription};
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_HISTORY_SIZE};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Trait for publishing security events.
///
/// This is the interface the validation service uses to hand events to
/// whatever logs, alerts on or stores them.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the bus.
    ///
    /// # Returns
    ///
    /// The number of active subscribers that received the event.
    async fn publish(&self, event: SecurityEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics
/// and keeps a bounded history of recent events for late readers.
pub struct InMemoryEventBus {
    /// Broadcast sender for events.
    sender: broadcast::Sender<SecurityEvent>,

    /// Most recent events, oldest first, at most `DEFAULT_HISTORY_SIZE`.
    history: RwLock<VecDeque<SecurityEvent>>,

    /// Active subscription count by topic.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Published events by type.
    by_type: RwLock<HashMap<EventType, u64>>,

    /// Total events published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            history: RwLock::new(VecDeque::with_capacity(DEFAULT_HISTORY_SIZE)),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            by_type: RwLock::new(HashMap::new()),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let topic_key = format!("{:?}", filter.topics);

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(topic_key.clone()).or_insert(0) += 1;
        }

        debug!(topics = ?filter.topics, min_severity = ?filter.min_severity, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), topic_key)
    }

    /// Get a stream of events matching a filter.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Recent events matching `filter`, newest last, at most `limit`.
    #[must_use]
    pub fn recent(&self, filter: &EventFilter, limit: usize) -> Vec<SecurityEvent> {
        let Ok(history) = self.history.read() else {
            return Vec::new();
        };
        let mut matched: Vec<SecurityEvent> = history
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect();
        matched.reverse();
        matched
    }

    /// Number of published events of a given type.
    #[must_use]
    pub fn count_of(&self, event_type: EventType) -> u64 {
        self.by_type
            .read()
            .map(|m| m.get(&event_type).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn record(&self, event: &SecurityEvent) {
        if let Ok(mut counts) = self.by_type.write() {
            *counts.entry(event.event_type).or_insert(0) += 1;
        }
        if let Ok(mut history) = self.history.write() {
            while history.len() >= DEFAULT_HISTORY_SIZE {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: SecurityEvent) -> usize {
        let event_type = event.event_type;
        let severity = event.severity;

        // Always increment counter (event was attempted)
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.record(&event);

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(
                    event_type = %event_type,
                    severity = %severity,
                    receivers = receiver_count,
                    "Event published"
                );
                receiver_count
            }
            Err(_) => {
                // No receivers; history still holds the event
                trace!(event_type = %event_type, "Event published with no live subscribers");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
