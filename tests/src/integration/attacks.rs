//! # Attack Scenarios
//!
//! What a hostile network can do to a sensor's messages, and the reason the
//! edge rejects each attempt with:
//!
//! | Attack | Expected reason |
//! |--------|-----------------|
//! | Replay inside the window | `replay_detected` |
//! | Replay after the window | `stale_or_future_timestamp` |
//! | Field tampering | `invalid_signature` |
//! | Spoofed source id | `invalid_signature` / `unknown_source` |
//! | Ciphertext tampering | `invalid_signature` (never reaches decryption) |
//! | Flooding | `rate_limit_exceeded`, other sources unaffected |

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use edge_validation::{
        Clock, PipelineConfig, RejectReason, StageToggles, TelemetrySealer, TelemetryValidationApi,
    };
    use shared_crypto::AeadKey;
    use shared_types::{MacKey, SourceKeys, TelemetryMessage};

    use crate::fixtures::{source_keys, Harness};

    // =========================================================================
    // REPLAY & FRESHNESS
    // =========================================================================

    #[test]
    fn test_replay_within_window_rejected() {
        let h = Harness::with_sources(&["s1"]);
        let captured = h.plain("s1", 20.0);
        assert!(h.validate(&captured).is_accepted());

        h.advance(Duration::from_secs(30));
        assert_eq!(
            h.validate(&captured).reason(),
            Some(RejectReason::ReplayDetected)
        );
    }

    #[test]
    fn test_replay_after_window_rejected_as_stale() {
        let h = Harness::with_sources(&["s1"]);
        let captured = h.plain("s1", 20.0);
        assert!(h.validate(&captured).is_accepted());

        h.advance(Duration::from_secs(300));
        h.pipeline.sweep_expired();
        assert_eq!(
            h.validate(&captured).reason(),
            Some(RejectReason::StaleOrFutureTimestamp)
        );
    }

    #[test]
    fn test_stale_rejected_regardless_of_nonce() {
        let h = Harness::with_sources(&["s1"]);
        let stale = h.aged("s1", chrono::Duration::seconds(121));
        assert_eq!(
            h.validate(&stale).reason(),
            Some(RejectReason::StaleOrFutureTimestamp)
        );
        // The fresh nonce was not consumed by the stale message
        assert_eq!(h.pipeline.stats().replay_cache_entries, 0);
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let h = Harness::with_sources(&["s1"]);
        let future = h.aged("s1", chrono::Duration::seconds(-121));
        assert_eq!(
            h.validate(&future).reason(),
            Some(RejectReason::StaleOrFutureTimestamp)
        );
    }

    #[test]
    fn test_window_edges_inclusive() {
        let h = Harness::with_sources(&["s1"]);
        assert!(h
            .validate(&h.aged("s1", chrono::Duration::seconds(120)))
            .is_accepted());
        assert!(h
            .validate(&h.aged("s1", chrono::Duration::seconds(-120)))
            .is_accepted());
    }

    #[test]
    fn test_wall_clock_step_does_not_expire_nonces() {
        let h = Harness::with_sources(&["s1"]);
        let captured = h.plain("s1", 1.0);
        assert!(h.validate(&captured).is_accepted());

        // NTP steps the wall clock forward; monotonic time barely moves
        h.clock
            .set_wall(crate::fixtures::epoch() + chrono::Duration::seconds(100));
        h.pipeline.sweep_expired();
        assert_eq!(
            h.validate(&captured).reason(),
            Some(RejectReason::ReplayDetected)
        );
    }

    // =========================================================================
    // TAMPERING & SPOOFING
    // =========================================================================

    #[test]
    fn test_tampered_fields_rejected() {
        let h = Harness::with_sources(&["s1"]);
        let tampers: Vec<(&str, Box<dyn Fn(&mut TelemetryMessage)>)> = vec![
            ("value", Box::new(|m: &mut TelemetryMessage| m.value = Some(serde_json::json!(99.0)))),
            ("unit", Box::new(|m: &mut TelemetryMessage| m.unit = Some("F".into()))),
            ("kind", Box::new(|m: &mut TelemetryMessage| m.kind = Some("pressure".into()))),
            (
                "timestamp",
                Box::new(|m: &mut TelemetryMessage| m.timestamp = Some("2024-06-01T12:00:01.000Z".into())),
            ),
            (
                "nonce",
                Box::new(|m: &mut TelemetryMessage| m.nonce = Some(uuid::Uuid::new_v4().to_string())),
            ),
            (
                "signature",
                Box::new(|m: &mut TelemetryMessage| {
                    let mut tag = BASE64.decode(m.signature.as_deref().unwrap()).unwrap();
                    tag[0] ^= 0x01;
                    m.signature = Some(BASE64.encode(tag));
                }),
            ),
            ("missing signature", Box::new(|m: &mut TelemetryMessage| m.signature = None)),
        ];

        for (field, tamper) in tampers {
            let mut msg = h.plain("s1", 20.0);
            tamper(&mut msg);
            assert_eq!(
                h.validate(&msg).reason(),
                Some(RejectReason::InvalidSignature),
                "tampered {field}"
            );
        }
        assert_eq!(h.pipeline.stats().accepted, 0);
    }

    #[test]
    fn test_extra_precision_cannot_ride_on_signature() {
        let h = Harness::with_sources(&["s1"]);
        let msg = h.plain("s1", 21.123457);
        let raw = msg.to_json().unwrap();
        assert!(raw.contains("21.123457"));

        let forged = raw.replace("21.123457", "21.1234568");
        assert_eq!(
            h.pipeline.validate_json(&forged).outcome.reason(),
            Some(RejectReason::MalformedMessage)
        );

        let mut msg = h.plain("s1", 21.5);
        msg.timestamp = Some("2024-06-01T12:00:00.0000009Z".into());
        assert_eq!(h.validate(&msg).reason(), Some(RejectReason::MalformedMessage));
        assert_eq!(h.pipeline.stats().accepted, 0);
    }

    #[test]
    fn test_tampered_ciphertext_never_decrypted() {
        let h = Harness::with_sources(&["s1"]);
        let mut msg = h.encrypted("s1", 50.0);
        let payload = msg.payload.as_mut().unwrap();
        let mut ct = BASE64.decode(&payload.ciphertext).unwrap();
        ct[0] ^= 0x80;
        payload.ciphertext = BASE64.encode(ct);

        assert_eq!(h.validate(&msg).reason(), Some(RejectReason::InvalidSignature));
        assert_eq!(h.pipeline.stats().rejected_for(RejectReason::DecryptionFailed), 0);
    }

    #[test]
    fn test_spoofed_source_rejected() {
        let h = Harness::with_sources(&["s1", "s2"]);
        let mut msg = h.plain("s1", 20.0);
        msg.source_id = Some("s2".into());
        assert_eq!(h.validate(&msg).reason(), Some(RejectReason::InvalidSignature));

        msg.source_id = Some("rogue-99".into());
        assert_eq!(h.validate(&msg).reason(), Some(RejectReason::UnknownSource));
    }

    #[test]
    fn test_attacker_with_own_key_is_unknown() {
        let h = Harness::with_sources(&["s1"]);
        let rogue = TelemetrySealer::new("rogue", Arc::new(source_keys("rogue", 0xEE)));
        let msg = rogue
            .plain("temperature", 1.0, None, crate::fixtures::epoch())
            .unwrap();
        assert_eq!(h.validate(&msg).reason(), Some(RejectReason::UnknownSource));
    }

    #[test]
    fn test_wrong_aead_key_fails_decryption() {
        let h = Harness::with_sources(&["s1"]);
        // Correct MAC key, wrong AEAD key: signature passes, open fails
        let confused = TelemetrySealer::new(
            "s1",
            Arc::new(SourceKeys {
                mac_key: MacKey::from_bytes("s1", vec![1u8; 32]).unwrap(),
                aead_key: Some(AeadKey::from_bytes([0x42; 32])),
            }),
        );
        let msg = confused
            .encrypted("humidity", 40.0, None, h.clock.now())
            .unwrap();
        assert_eq!(h.validate(&msg).reason(), Some(RejectReason::DecryptionFailed));
    }

    #[test]
    fn test_malformed_inputs() {
        let h = Harness::with_sources(&["s1"]);
        for raw in ["", "[]", "null", "{\"sensor_id\": 5}", "{}"] {
            assert_eq!(
                h.pipeline.validate_json(raw).outcome.reason(),
                Some(RejectReason::MalformedMessage),
                "input {raw:?}"
            );
        }
    }

    // =========================================================================
    // FLOODING & ISOLATION
    // =========================================================================

    #[test]
    fn test_flood_does_not_starve_other_sources() {
        let h = Harness::with_sources(&["attacker", "victim"]);
        for i in 0..500 {
            h.validate(&h.plain("attacker", f64::from(i)));
        }
        assert_eq!(
            h.pipeline.stats().rejected_for(RejectReason::RateLimitExceeded),
            490
        );
        assert!(h.validate(&h.plain("victim", 1.0)).is_accepted());

        let stats = h.pipeline.rate_stats();
        assert_eq!(stats["attacker"].blocked_requests, 490);
        assert_eq!(stats["victim"].blocked_requests, 0);
    }

    #[test]
    fn test_concurrent_sources_keep_separate_state() {
        let h = Harness::with_sources(&["a", "b"]);
        let messages: Vec<(&str, Vec<TelemetryMessage>)> = ["a", "b"]
            .into_iter()
            .map(|s| (s, (0..50).map(|i| h.plain(s, f64::from(i))).collect()))
            .collect();

        std::thread::scope(|scope| {
            for (_, batch) in &messages {
                let pipeline = Arc::clone(&h.pipeline);
                scope.spawn(move || {
                    for msg in batch {
                        pipeline.validate(msg);
                    }
                });
            }
        });

        let stats = h.pipeline.rate_stats();
        for source in ["a", "b"] {
            assert_eq!(stats[source].total_requests, 50);
            assert_eq!(stats[source].allowed_requests, 10);
        }
        assert_eq!(h.pipeline.stats().accepted, 20);
        assert_eq!(h.pipeline.stats().replay_cache_entries, 100);
    }

    #[test]
    fn test_replay_cache_bounded_per_source() {
        let mut config = PipelineConfig::default();
        config.freshness.max_entries_per_source = 5;
        config.stages = StageToggles {
            rate_limit: false,
            ..StageToggles::default()
        };
        let h = Harness::new(config, &["s1"]);

        let first = h.plain("s1", 0.0);
        assert!(h.validate(&first).is_accepted());
        for i in 1..10 {
            assert!(h.validate(&h.plain("s1", f64::from(i))).is_accepted());
        }
        assert_eq!(h.pipeline.stats().replay_cache_entries, 5);
        // Evicted oldest nonce is forgotten; the window still bounds the damage
        assert!(h.validate(&first).is_accepted());
    }
}
