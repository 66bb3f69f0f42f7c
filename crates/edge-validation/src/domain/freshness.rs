//! # Freshness Guard
//!
//! Two checks, applied in this order:
//!
//! 1. **Timestamp window**: the message timestamp must lie in
//!    `[now - W, now + W]` (inclusive, wall clock).
//! 2. **Nonce uniqueness**: a `(source_id, nonce)` pair is admitted once.
//!
//! ## Replay cache
//!
//! Nonces are kept per source for `2W` of monotonic time. Any message older
//! than that already fails the window check, so forgetting the nonce cannot
//! open a replay. Each source also has an entry cap; at the cap the oldest
//! nonce is evicted and the eviction is logged and counted.
//!
//! Sources are sharded through a `DashMap`, each with its own lock, so
//! different sources never contend.

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use dashmap::DashMap;
use edge_telemetry::{log_stage, metric_inc, REPLAY_CACHE_ENTRIES, REPLAY_CACHE_EVICTIONS};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::errors::ValidationError;

/// Check `timestamp` against `[now - window, now + window]`.
///
/// # Errors
///
/// `StaleOrFutureTimestamp` with the offending instant and the window bounds.
pub fn check_timestamp(
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<(), ValidationError> {
    let window =
        ChronoDuration::from_std(window).unwrap_or_else(|_| ChronoDuration::days(36_500));
    let earliest = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let latest = now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);

    if timestamp < earliest || timestamp > latest {
        return Err(ValidationError::StaleOrFutureTimestamp {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            earliest: earliest.to_rfc3339_opts(SecondsFormat::Millis, true),
            latest: latest.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
    }
    Ok(())
}

/// Retention and capacity for the replay cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPolicy {
    /// How long a nonce is remembered
    pub retention: Duration,
    /// Most nonces kept per source
    pub max_entries_per_source: usize,
}

impl ReplayPolicy {
    /// Policy for a freshness window: retention is twice the window.
    pub fn for_window(window: Duration, max_entries_per_source: usize) -> Self {
        Self {
            retention: window.saturating_mul(2),
            max_entries_per_source: max_entries_per_source.max(1),
        }
    }
}

#[derive(Debug, Default)]
struct SourceNonces {
    seen: HashMap<Uuid, Duration>,
    order: VecDeque<(Uuid, Duration)>,
}

impl SourceNonces {
    /// Drop nonces older than `retention`. Returns how many were removed.
    fn prune(&mut self, now: Duration, retention: Duration) -> usize {
        let mut removed = 0;
        while let Some(&(nonce, seen_at)) = self.order.front() {
            if now.saturating_sub(seen_at) <= retention {
                break;
            }
            self.order.pop_front();
            self.seen.remove(&nonce);
            removed += 1;
        }
        removed
    }

    fn evict_oldest(&mut self) -> Option<Uuid> {
        let (nonce, _) = self.order.pop_front()?;
        self.seen.remove(&nonce);
        Some(nonce)
    }
}

/// Per-source nonce memory.
#[derive(Debug, Default)]
pub struct ReplayCache {
    sources: DashMap<String, Arc<Mutex<SourceNonces>>>,
    total: AtomicUsize,
}

impl ReplayCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `nonce` for `source_id` at monotonic time `now`.
    ///
    /// The check and the insert happen under one per-source lock, so of two
    /// concurrent messages with the same nonce exactly one is admitted.
    ///
    /// # Errors
    ///
    /// `ReplayDetected` if the nonce is still remembered for this source.
    pub fn check_and_insert(
        &self,
        source_id: &str,
        nonce: Uuid,
        now: Duration,
        policy: ReplayPolicy,
    ) -> Result<(), ValidationError> {
        let entry = self
            .sources
            .entry(source_id.to_string())
            .or_default()
            .value()
            .clone();
        let mut nonces = entry.lock();

        let pruned = nonces.prune(now, policy.retention);
        self.release(pruned);

        if nonces.seen.contains_key(&nonce) {
            return Err(ValidationError::ReplayDetected {
                source_id: source_id.to_string(),
                nonce: nonce.hyphenated().to_string(),
            });
        }

        let mut evicted = 0;
        while nonces.seen.len() >= policy.max_entries_per_source {
            if nonces.evict_oldest().is_none() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            self.release(evicted);
            REPLAY_CACHE_EVICTIONS.inc_by(evicted as f64);
            log_stage!(
                warn,
                "freshness",
                source_id,
                "Replay cache at capacity, evicted oldest nonces",
                evicted,
                capacity = policy.max_entries_per_source
            );
        }

        nonces.seen.insert(nonce, now);
        nonces.order.push_back((nonce, now));
        self.total.fetch_add(1, Ordering::Relaxed);
        metric_inc!(REPLAY_CACHE_ENTRIES);
        Ok(())
    }

    /// Whether `nonce` is currently remembered for `source_id`.
    pub fn contains(&self, source_id: &str, nonce: &Uuid) -> bool {
        self.sources
            .get(source_id)
            .is_some_and(|entry| entry.lock().seen.contains_key(nonce))
    }

    /// Remove expired nonces from every source.
    ///
    /// Returns the number of nonces removed.
    pub fn sweep_expired(&self, now: Duration, retention: Duration) -> usize {
        let removed: usize = self
            .sources
            .iter()
            .map(|entry| entry.value().lock().prune(now, retention))
            .sum();
        self.release(removed);
        removed
    }

    /// Nonces held across all sources.
    pub fn len(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Whether the cache holds no nonces.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nonces held for one source.
    pub fn len_for(&self, source_id: &str) -> usize {
        self.sources
            .get(source_id)
            .map_or(0, |entry| entry.lock().seen.len())
    }

    fn release(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.total.fetch_sub(count, Ordering::Relaxed);
        REPLAY_CACHE_ENTRIES.sub(count as f64);
    }
}
