//! # Runtime Integration
//!
//! Configuration file → key store → container → dispatcher → forwarded
//! output, the way the `edge-runtime` binary runs it.

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use chrono::Utc;
    use edge_runtime::{
        build_key_store, recent_alerts, relay_alerts, subscribe_alerts, EdgeConfig, EdgeContainer,
        SourceDispatcher, DEFAULT_ALERT_SEVERITY,
    };
    use edge_validation::{RejectReason, TelemetrySealer, TelemetryValidationApi};
    use shared_bus::{EventType, SecurityEvent};
    use shared_types::KeyProvider;
    use tempfile::NamedTempFile;

    const MAC_A: &str = "0101010101010101010101010101010101010101010101010101010101010101";
    const MAC_B: &str = "0202020202020202020202020202020202020202020202020202020202020202";
    const AEAD: &str = "0303030303030303030303030303030303030303030303030303030303030303";

    fn write_config(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    fn two_source_config() -> NamedTempFile {
        write_config(&format!(
            r#"
[pipeline.freshness]
window_secs = 120

[keys]
shared_aead_key = "{AEAD}"

[keys.sources.temp-01]
mac_key = "{MAC_A}"

[keys.sources.humidity-01]
mac_key = "{MAC_B}"
"#
        ))
    }

    fn sealer(config: &EdgeConfig, source: &str) -> TelemetrySealer {
        let store = build_key_store(&config.keys).unwrap();
        TelemetrySealer::new(source, store.keys_for(source).unwrap())
    }

    #[tokio::test]
    async fn test_config_file_to_forwarded_output() {
        let file = two_source_config();
        let config = EdgeConfig::from_file(file.path()).unwrap();
        config.validate().unwrap();

        let temp = sealer(&config, "temp-01");
        let humidity = sealer(&config, "humidity-01");
        let plain = temp
            .plain("temperature", 22.5, Some("C"), Utc::now())
            .unwrap()
            .to_json()
            .unwrap();
        let encrypted = humidity
            .encrypted("humidity", 48.0, Some("%"), Utc::now())
            .unwrap()
            .to_json()
            .unwrap();
        let input = format!("{plain}\n{encrypted}\n{plain}\nnot-json\n");

        let (container, mut forwarded) = EdgeContainer::build(config).unwrap();
        let mut dispatcher =
            SourceDispatcher::new(Arc::clone(&container.service), container.config.dispatch);
        let lines = dispatcher.run_lines(input.as_bytes()).await.unwrap();
        assert_eq!(lines, 4);
        let lanes = dispatcher.finish().await;
        assert_eq!(lanes.len(), 2);

        let stats = container.pipeline().stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected_for(RejectReason::ReplayDetected), 1);
        assert_eq!(stats.rejected_for(RejectReason::MalformedMessage), 1);

        let mut out = Vec::new();
        while let Ok(record) = forwarded.try_recv() {
            out.push(record);
        }
        out.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].source_id, "humidity-01");
        assert_eq!(out[0].value, Some(48.0));
        assert!(out[0].decrypted);
        assert_eq!(out[1].value, Some(22.5));

        assert_eq!(container.bus.count_of(EventType::ReplayAttack), 1);
        assert_eq!(container.bus.count_of(EventType::MalformedMessage), 1);
        assert_eq!(container.bus.count_of(EventType::SourceFirstSeen), 2);
    }

    #[tokio::test]
    async fn test_alert_relay_sees_attacks_only() {
        let config = EdgeConfig::from_file(two_source_config().path()).unwrap();
        let temp = sealer(&config, "temp-01");
        let good = temp
            .plain("temperature", 22.5, Some("C"), Utc::now())
            .unwrap();
        let mut forged = temp
            .plain("temperature", 23.0, Some("C"), Utc::now())
            .unwrap();
        forged.value = Some(serde_json::json!(99.0));
        let input = format!(
            "{good}\n{good}\n{forged}\nnot-json\n",
            good = good.to_json().unwrap(),
            forged = forged.to_json().unwrap(),
        );

        let (container, _forwarded) = EdgeContainer::build(config).unwrap();
        let alerts = subscribe_alerts(&container.bus, DEFAULT_ALERT_SEVERITY);
        let mut dispatcher =
            SourceDispatcher::new(Arc::clone(&container.service), container.config.dispatch);
        dispatcher.run_lines(input.as_bytes()).await.unwrap();
        dispatcher.finish().await;

        let recent = recent_alerts(&container.bus, DEFAULT_ALERT_SEVERITY, 10);
        assert_eq!(recent.len(), 2);
        drop(container);

        let mut out = Vec::new();
        let relayed = relay_alerts(alerts, &mut out).await.unwrap();
        assert_eq!(relayed, 2);
        let mut types: Vec<EventType> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str::<SecurityEvent>(l).unwrap().event_type)
            .collect();
        types.sort_by_key(|t| format!("{t:?}"));
        assert_eq!(types, vec![EventType::InvalidSignature, EventType::ReplayAttack]);
    }

    #[tokio::test]
    async fn test_env_override_disables_signature_stage() {
        let file = two_source_config();
        let mut config = EdgeConfig::from_file(file.path()).unwrap();
        config.apply_env_overrides(|name| {
            (name == "ENABLE_SIGNATURE_VERIFICATION").then(|| "false".to_string())
        });

        let mut msg = sealer(&config, "temp-01")
            .plain("temperature", 1.0, None, Utc::now())
            .unwrap();
        msg.signature = Some("bm90IGEgdGFn".into());

        let (container, _forwarded) = EdgeContainer::build(config).unwrap();
        assert!(container.service.process(&msg).await.is_accepted());
    }

    #[test]
    fn test_env_supplies_declared_source_key() {
        let file = write_config(
            r#"
[keys.sources.wind-01]
"#,
        );
        let mut config = EdgeConfig::from_file(file.path()).unwrap();
        assert!(config.validate().is_err());

        config.apply_env_overrides(|name| {
            (name == "SENSOR_WIND_01_HMAC_KEY").then(|| MAC_A.to_string())
        });
        config.validate().unwrap();
        let store = build_key_store(&config.keys).unwrap();
        assert_eq!(store.sources(), vec!["wind-01".to_string()]);
    }

    #[test]
    fn test_bad_key_material_is_fatal() {
        let file = write_config(
            r#"
[keys.sources.temp-01]
mac_key = "not-hex"
"#,
        );
        let config = EdgeConfig::from_file(file.path()).unwrap();
        assert!(EdgeContainer::build(config).is_err());
    }
}
