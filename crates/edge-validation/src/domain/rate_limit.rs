//! # Rate Limiter
//!
//! Per-source admission control with two policies.
//!
//! ## Algorithms
//!
//! **Token bucket**: holds up to `C` tokens, refilled at `R` tokens/s,
//! computed lazily at admission as `min(C, tokens + elapsed * R)`. Each
//! admitted message consumes one token; with fewer than one token the message
//! is rejected and nothing is consumed. Buckets start full, so after an idle
//! period a source may burst up to `C` messages.
//!
//! **Leaky bucket**: a virtual queue drains at `R` messages/s and each
//! admission adds one. A message is rejected if the depth would exceed
//! `min(C, drain_granularity)`. With the default granularity of 1 admission is
//! smoothed to one message per `1/R` seconds no matter how long the source
//! was idle.
//!
//! Buckets are created on the first message from a source and live for the
//! life of the limiter. Each sits behind its own lock.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RateAlgorithm, RateLimitConfig};

use super::errors::ValidationError;

/// Token bucket state.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Duration,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, refill_per_sec: f64, now: Duration) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            refill_per_sec,
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Try to take one token at monotonic time `now`.
    ///
    /// Returns `Err(retry_after)` when the bucket is empty.
    pub fn try_acquire(&mut self, now: Duration) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens < 1.0 {
            return Err(wait_for(1.0 - self.tokens, self.refill_per_sec));
        }
        self.tokens -= 1.0;
        Ok(())
    }

    /// Tokens currently available (after refill).
    pub fn available(&mut self, now: Duration) -> f64 {
        self.refill(now);
        self.tokens
    }

    fn refill(&mut self, now: Duration) {
        let elapsed = now.saturating_sub(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn reconfigure(&mut self, capacity: u32, refill_per_sec: f64) {
        self.capacity = f64::from(capacity);
        self.refill_per_sec = refill_per_sec;
        self.tokens = self.tokens.min(self.capacity);
    }
}

/// Leaky bucket state.
#[derive(Debug, Clone, PartialEq)]
pub struct LeakyBucket {
    depth_limit: f64,
    drain_per_sec: f64,
    depth: f64,
    last_drain: Duration,
}

impl LeakyBucket {
    /// Create an empty queue.
    pub fn new(capacity: u32, drain_per_sec: f64, drain_granularity: u32, now: Duration) -> Self {
        Self {
            depth_limit: effective_depth(capacity, drain_granularity),
            drain_per_sec,
            depth: 0.0,
            last_drain: now,
        }
    }

    /// Try to enqueue one message at monotonic time `now`.
    ///
    /// Returns `Err(retry_after)` when the queue is full.
    pub fn try_acquire(&mut self, now: Duration) -> Result<(), Duration> {
        self.drain(now);
        let next = self.depth + 1.0;
        if next > self.depth_limit {
            return Err(wait_for(next - self.depth_limit, self.drain_per_sec));
        }
        self.depth = next;
        Ok(())
    }

    /// Current virtual queue depth (after draining).
    pub fn depth(&mut self, now: Duration) -> f64 {
        self.drain(now);
        self.depth
    }

    fn drain(&mut self, now: Duration) {
        let elapsed = now.saturating_sub(self.last_drain).as_secs_f64();
        self.depth = (self.depth - elapsed * self.drain_per_sec).max(0.0);
        self.last_drain = now;
    }

    fn reconfigure(&mut self, capacity: u32, drain_per_sec: f64, drain_granularity: u32) {
        self.depth_limit = effective_depth(capacity, drain_granularity);
        self.drain_per_sec = drain_per_sec;
    }
}

fn effective_depth(capacity: u32, drain_granularity: u32) -> f64 {
    f64::from(capacity.min(drain_granularity.max(1)))
}

fn wait_for(deficit: f64, rate: f64) -> Duration {
    if rate <= 0.0 || !deficit.is_finite() {
        return Duration::MAX;
    }
    Duration::try_from_secs_f64(deficit / rate).unwrap_or(Duration::MAX)
}

/// A per-source bucket of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Bucket {
    /// Burst-tolerant
    Token(TokenBucket),
    /// Smoothing
    Leaky(LeakyBucket),
}

impl Bucket {
    fn create(config: &RateLimitConfig, now: Duration) -> Self {
        match config.algorithm {
            RateAlgorithm::TokenBucket => {
                Self::Token(TokenBucket::new(config.capacity, config.refill_per_second, now))
            }
            RateAlgorithm::LeakyBucket => Self::Leaky(LeakyBucket::new(
                config.capacity,
                config.refill_per_second,
                config.drain_granularity,
                now,
            )),
        }
    }

    fn algorithm(&self) -> RateAlgorithm {
        match self {
            Self::Token(_) => RateAlgorithm::TokenBucket,
            Self::Leaky(_) => RateAlgorithm::LeakyBucket,
        }
    }

    /// Bring an existing bucket in line with `config`, keeping its fill level
    /// when the algorithm is unchanged.
    fn apply(&mut self, config: &RateLimitConfig, now: Duration) {
        if self.algorithm() != config.algorithm {
            *self = Self::create(config, now);
            return;
        }
        match self {
            Self::Token(b) => b.reconfigure(config.capacity, config.refill_per_second),
            Self::Leaky(b) => b.reconfigure(
                config.capacity,
                config.refill_per_second,
                config.drain_granularity,
            ),
        }
    }

    fn try_acquire(&mut self, now: Duration) -> Result<(), Duration> {
        match self {
            Self::Token(b) => b.try_acquire(now),
            Self::Leaky(b) => b.try_acquire(now),
        }
    }
}

/// Admission counters for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Admission attempts
    pub total_requests: u64,
    /// Admitted
    pub allowed_requests: u64,
    /// Rejected
    pub blocked_requests: u64,
    /// Wall time of the last attempt
    pub last_request: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SourceLimiter {
    bucket: Bucket,
    stats: SourceStats,
}

/// Per-source rate limiter.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Arc<Mutex<SourceLimiter>>>,
}

impl RateLimiter {
    /// Create a limiter with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject one message from `source_id`.
    ///
    /// `now` is monotonic time for bucket arithmetic; `wall` is recorded in
    /// the source statistics.
    ///
    /// # Errors
    ///
    /// `RateLimitExceeded` with the time until a message would be admitted.
    pub fn check(
        &self,
        source_id: &str,
        config: &RateLimitConfig,
        now: Duration,
        wall: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let entry = self
            .buckets
            .entry(source_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SourceLimiter {
                    bucket: Bucket::create(config, now),
                    stats: SourceStats::default(),
                }))
            })
            .value()
            .clone();
        let mut limiter = entry.lock();

        limiter.bucket.apply(config, now);
        limiter.stats.total_requests += 1;
        limiter.stats.last_request = Some(wall);

        match limiter.bucket.try_acquire(now) {
            Ok(()) => {
                limiter.stats.allowed_requests += 1;
                Ok(())
            }
            Err(retry_after) => {
                limiter.stats.blocked_requests += 1;
                Err(ValidationError::RateLimitExceeded {
                    source_id: source_id.to_string(),
                    retry_after_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Statistics for one source.
    pub fn stats(&self, source_id: &str) -> Option<SourceStats> {
        self.buckets
            .get(source_id)
            .map(|entry| entry.lock().stats.clone())
    }

    /// Statistics for every source seen so far.
    pub fn all_stats(&self) -> BTreeMap<String, SourceStats> {
        self.buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().lock().stats.clone()))
            .collect()
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(algorithm: RateAlgorithm) -> RateLimitConfig {
        RateLimitConfig {
            algorithm,
            capacity: 10,
            refill_per_second: 1.0,
            drain_granularity: 1,
        }
    }

    fn burst(limiter: &RateLimiter, cfg: &RateLimitConfig, n: usize, at: Duration) -> usize {
        (0..n)
            .filter(|_| limiter.check("s1", cfg, at, Utc::now()).is_ok())
            .count()
    }

    #[test]
    fn test_token_bucket_burst_then_refill() {
        let limiter = RateLimiter::new();
        let cfg = config(RateAlgorithm::TokenBucket);

        assert_eq!(burst(&limiter, &cfg, 11, Duration::ZERO), 10);

        // After 1/R seconds exactly one more
        let later = Duration::from_secs(1);
        assert_eq!(burst(&limiter, &cfg, 2, later), 1);

        let stats = limiter.stats("s1").unwrap();
        assert_eq!(stats.total_requests, 13);
        assert_eq!(stats.allowed_requests, 11);
        assert_eq!(stats.blocked_requests, 2);
        assert!(stats.last_request.is_some());
    }

    #[test]
    fn test_rejection_does_not_consume() {
        let mut bucket = TokenBucket::new(1, 1.0, Duration::ZERO);
        assert!(bucket.try_acquire(Duration::ZERO).is_ok());
        for _ in 0..5 {
            assert!(bucket.try_acquire(Duration::from_millis(500)).is_err());
        }
        assert!(bucket.try_acquire(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_token_bucket_caps_at_capacity() {
        let mut bucket = TokenBucket::new(3, 1.0, Duration::ZERO);
        assert!((bucket.available(Duration::from_secs(3600)) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_leaky_bucket_smooths_after_idle() {
        let limiter = RateLimiter::new();
        let cfg = config(RateAlgorithm::LeakyBucket);

        assert_eq!(burst(&limiter, &cfg, 11, Duration::ZERO), 1);
        // Long idle does not allow a burst
        assert_eq!(burst(&limiter, &cfg, 11, Duration::from_secs(3600)), 1);
    }

    #[test]
    fn test_leaky_bucket_granularity() {
        let limiter = RateLimiter::new();
        let cfg = RateLimitConfig {
            drain_granularity: 4,
            ..config(RateAlgorithm::LeakyBucket)
        };
        assert_eq!(burst(&limiter, &cfg, 11, Duration::ZERO), 4);
    }

    #[test]
    fn test_retry_after_reported() {
        let limiter = RateLimiter::new();
        let cfg = config(RateAlgorithm::TokenBucket);
        burst(&limiter, &cfg, 10, Duration::ZERO);

        let err = limiter
            .check("s1", &cfg, Duration::from_millis(250), Utc::now())
            .unwrap_err();
        match err {
            ValidationError::RateLimitExceeded { retry_after_ms, .. } => {
                assert!((740..=760).contains(&retry_after_ms), "{retry_after_ms}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_sources_are_independent() {
        let limiter = RateLimiter::new();
        let cfg = config(RateAlgorithm::TokenBucket);
        burst(&limiter, &cfg, 11, Duration::ZERO);

        assert!(limiter.check("s2", &cfg, Duration::ZERO, Utc::now()).is_ok());
        assert_eq!(limiter.stats("s2").unwrap().allowed_requests, 1);
        assert_eq!(limiter.stats("s1").unwrap().blocked_requests, 1);
        assert_eq!(limiter.bucket_count(), 2);
        assert_eq!(limiter.all_stats().len(), 2);
    }

    #[test]
    fn test_algorithm_switch_replaces_bucket() {
        let limiter = RateLimiter::new();
        let token = config(RateAlgorithm::TokenBucket);
        burst(&limiter, &token, 10, Duration::ZERO);
        assert!(limiter.check("s1", &token, Duration::ZERO, Utc::now()).is_err());

        let leaky = config(RateAlgorithm::LeakyBucket);
        assert!(limiter.check("s1", &leaky, Duration::ZERO, Utc::now()).is_ok());
    }
}
