//! # Integration Test Flows
//!
//! Accept paths through the whole pipeline, admission control under both
//! algorithms, stage toggles and event delivery through the shared bus.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use edge_validation::{
        BusEventSink, ChannelForwarder, EdgeValidationService, PipelineConfig, RateAlgorithm,
        RejectReason, StageToggles, TelemetryValidationApi,
    };
    use shared_bus::{EventFilter, EventTopic, EventType, InMemoryEventBus, Severity};

    use crate::fixtures::Harness;

    // =========================================================================
    // ACCEPT PATHS
    // =========================================================================

    #[test]
    fn test_plain_reading_accepted() {
        let h = Harness::with_sources(&["temp-01"]);
        let msg = h.plain("temp-01", 21.5);

        let outcome = h.validate(&msg);
        let forwarded = outcome.accepted().expect("accepted");
        assert_eq!(forwarded.source_id, "temp-01");
        assert_eq!(forwarded.kind, "temperature");
        assert_eq!(forwarded.value, Some(21.5));
        assert_eq!(forwarded.unit.as_deref(), Some("C"));
        assert!(!forwarded.decrypted);
        assert_eq!(forwarded.processed_at, crate::fixtures::epoch());
    }

    #[test]
    fn test_encrypted_reading_accepted() {
        let h = Harness::with_sources(&["humidity-01"]);
        let msg = h.encrypted("humidity-01", 63.25);
        assert!(msg.value.is_none());

        let outcome = h.validate(&msg);
        let forwarded = outcome.accepted().expect("accepted");
        assert_eq!(forwarded.value, Some(63.25));
        assert_eq!(forwarded.unit.as_deref(), Some("%"));
        assert!(forwarded.decrypted);
    }

    #[test]
    fn test_json_wire_round_trip_accepted() {
        let h = Harness::with_sources(&["wind-01"]);
        let raw = h.plain("wind-01", 7.0).to_json().unwrap();

        let report = h.pipeline.validate_json(&raw);
        assert!(report.outcome.is_accepted());
    }

    #[test]
    fn test_equivalent_timestamp_encoding_still_verifies() {
        let h = Harness::with_sources(&["temp-01"]);
        let mut msg = h.plain("temp-01", 1.0);
        let ts = msg.timestamp.clone().unwrap();
        msg.timestamp = Some(ts.replace('Z', "+00:00"));

        assert!(h.validate(&msg).is_accepted());
    }

    // =========================================================================
    // RATE LIMITING
    // =========================================================================

    #[test]
    fn test_token_bucket_burst_then_refill() {
        let h = Harness::with_sources(&["s1"]);

        let outcomes: Vec<_> = (0..11)
            .map(|i| h.validate(&h.plain("s1", f64::from(i))))
            .collect();
        assert_eq!(outcomes.iter().filter(|o| o.is_accepted()).count(), 10);
        assert_eq!(outcomes[10].reason(), Some(RejectReason::RateLimitExceeded));

        h.advance(Duration::from_secs(1));
        assert!(h.validate(&h.plain("s1", 0.0)).is_accepted());
        assert_eq!(
            h.validate(&h.plain("s1", 0.0)).reason(),
            Some(RejectReason::RateLimitExceeded)
        );
    }

    #[test]
    fn test_leaky_bucket_smooths_admission() {
        let mut config = PipelineConfig::default();
        config.rate_limit.algorithm = RateAlgorithm::LeakyBucket;
        let h = Harness::new(config, &["s1"]);

        let accepted = (0..11)
            .filter(|i| h.validate(&h.plain("s1", f64::from(*i))).is_accepted())
            .count();
        assert_eq!(accepted, 1);

        h.advance(Duration::from_secs(1));
        assert!(h.validate(&h.plain("s1", 0.0)).is_accepted());
    }

    #[test]
    fn test_leaky_bucket_granularity() {
        let mut config = PipelineConfig::default();
        config.rate_limit.algorithm = RateAlgorithm::LeakyBucket;
        config.rate_limit.drain_granularity = 3;
        let h = Harness::new(config, &["s1"]);

        let accepted = (0..11)
            .filter(|i| h.validate(&h.plain("s1", f64::from(*i))).is_accepted())
            .count();
        assert_eq!(accepted, 3);
    }

    #[test]
    fn test_idle_source_bursts_only_with_token_bucket() {
        let token = Harness::with_sources(&["s1"]);
        let mut leaky_config = PipelineConfig::default();
        leaky_config.rate_limit.algorithm = RateAlgorithm::LeakyBucket;
        let leaky = Harness::new(leaky_config, &["s1"]);

        for h in [&token, &leaky] {
            h.validate(&h.plain("s1", 0.0));
            h.advance(Duration::from_secs(600));
        }

        let burst = |h: &Harness| {
            (0..5)
                .filter(|_| h.validate(&h.plain("s1", 0.0)).is_accepted())
                .count()
        };
        assert_eq!(burst(&token), 5);
        assert_eq!(burst(&leaky), 1);
    }

    // =========================================================================
    // STAGE TOGGLES
    // =========================================================================

    #[test]
    fn test_disabled_signature_keeps_stage_order() {
        let config = PipelineConfig {
            stages: StageToggles {
                signature: false,
                ..StageToggles::default()
            },
            ..PipelineConfig::default()
        };
        let h = Harness::new(config, &["s1"]);

        let mut msg = h.plain("s1", 5.0);
        msg.signature = Some("AAAA".to_string());
        assert!(h.validate(&msg).is_accepted());

        // Later stages still run, in order
        assert_eq!(h.validate(&msg).reason(), Some(RejectReason::ReplayDetected));
        let stale = {
            let mut m = h.aged("s1", chrono::Duration::seconds(600));
            m.signature = None;
            m
        };
        assert_eq!(
            h.validate(&stale).reason(),
            Some(RejectReason::StaleOrFutureTimestamp)
        );
    }

    #[test]
    fn test_all_stages_disabled_only_canonicalizes() {
        let config = PipelineConfig {
            stages: StageToggles::none(),
            ..PipelineConfig::default()
        };
        let h = Harness::new(config, &["s1"]);

        let old = h.aged("s1", chrono::Duration::days(2));
        assert!(h.validate(&old).is_accepted());
        assert!(h.validate(&old).is_accepted());

        let encrypted = h.encrypted("s1", 9.0);
        let forwarded = h.validate(&encrypted).accepted().cloned().unwrap();
        assert_eq!(forwarded.value, None);
        assert!(!forwarded.decrypted);

        let mut broken = h.plain("s1", 1.0);
        broken.kind = None;
        assert_eq!(h.validate(&broken).reason(), Some(RejectReason::MalformedMessage));
    }

    #[test]
    fn test_reconfigure_applies_to_next_message() {
        let h = Harness::with_sources(&["s1"]);
        let old = h.aged("s1", chrono::Duration::seconds(300));
        assert_eq!(
            h.validate(&old).reason(),
            Some(RejectReason::StaleOrFutureTimestamp)
        );

        let mut config = (*h.pipeline.config()).clone();
        config.freshness.window_secs = 600;
        h.pipeline.reconfigure(config).unwrap();
        assert!(h.validate(&old).is_accepted());
    }

    // =========================================================================
    // EVENTS & FORWARDING
    // =========================================================================

    #[tokio::test]
    async fn test_service_publishes_to_bus_and_forwards() {
        let h = Harness::with_sources(&["s1"]);
        let bus = Arc::new(InMemoryEventBus::new());
        let mut rejections = bus.subscribe(EventFilter::topics(vec![EventTopic::Security]));
        let (forwarder, mut forwarded) = ChannelForwarder::channel(8);
        let service = EdgeValidationService::new(
            Arc::clone(&h.pipeline),
            forwarder,
            BusEventSink::new(Arc::clone(&bus)),
        );

        let msg = h.plain("s1", 3.0);
        assert!(service.process(&msg).await.is_accepted());
        assert!(!service.process(&msg).await.is_accepted());

        let delivered = forwarded.try_recv().unwrap();
        assert_eq!(delivered.value, Some(3.0));
        assert!(forwarded.try_recv().is_err());

        assert_eq!(bus.count_of(EventType::SourceFirstSeen), 1);
        let events = rejections.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::ReplayAttack);
        assert_eq!(events[0].source_id.as_deref(), Some("s1"));
        assert!(events[0].severity >= Severity::Warning);
        assert_eq!(events[0].details["reason"], "replay_detected");
    }

    #[test]
    fn test_stats_track_every_outcome() {
        let h = Harness::with_sources(&["s1"]);
        let msg = h.plain("s1", 1.0);
        h.validate(&msg);
        h.validate(&msg);
        h.pipeline.validate_json("{");

        let stats = h.pipeline.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected_for(RejectReason::ReplayDetected), 1);
        assert_eq!(stats.rejected_for(RejectReason::MalformedMessage), 1);
        assert_eq!(stats.sources_seen, 1);
        assert_eq!(stats.replay_cache_entries, 1);
    }
}
