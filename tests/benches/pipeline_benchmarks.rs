//! # Edge Pipeline Benchmarks
//!
//! | Operation | Target |
//! |-----------|--------|
//! | Canonicalize | < 10µs |
//! | Full validation, plaintext | < 50µs |
//! | Full validation, encrypted | < 100µs |
//! | Replay cache insert at 10k entries | < 5µs |

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use edge_validation::{
    canonicalize, PipelineConfig, ReplayCache, ReplayPolicy, StageToggles, TelemetrySealer,
    TelemetryValidationApi, ValidationPipeline,
};
use shared_crypto::AeadKey;
use shared_types::{MacKey, SourceKeys, StaticKeyStore};
use std::sync::Arc;
use std::time::Duration;

fn keys() -> SourceKeys {
    SourceKeys {
        mac_key: MacKey::from_bytes("bench", vec![7u8; 32]).unwrap(),
        aead_key: Some(AeadKey::from_bytes([9u8; 32])),
    }
}

fn pipeline() -> ValidationPipeline {
    let store = StaticKeyStore::new().with_source("bench", keys()).unwrap();
    let config = PipelineConfig {
        stages: StageToggles {
            rate_limit: false,
            ..StageToggles::default()
        },
        ..PipelineConfig::default()
    };
    ValidationPipeline::with_system_clock(config, Arc::new(store)).unwrap()
}

fn bench_canonicalize(c: &mut Criterion) {
    let sealer = TelemetrySealer::new("bench", Arc::new(keys()));
    let plain = sealer.plain("temperature", 21.5, Some("C"), Utc::now()).unwrap();
    let encrypted = sealer.encrypted("temperature", 21.5, Some("C"), Utc::now()).unwrap();

    let mut group = c.benchmark_group("canonicalize");
    group.bench_function("plain", |b| b.iter(|| black_box(canonicalize(&plain).unwrap())));
    group.bench_function("encrypted", |b| {
        b.iter(|| black_box(canonicalize(&encrypted).unwrap()))
    });
    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let sealer = TelemetrySealer::new("bench", Arc::new(keys()));
    let mut group = c.benchmark_group("validate");

    for (name, encrypt) in [("plain", false), ("encrypted", true)] {
        let pipeline = pipeline();
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    if encrypt {
                        sealer.encrypted("t", 1.0, None, Utc::now()).unwrap()
                    } else {
                        sealer.plain("t", 1.0, None, Utc::now()).unwrap()
                    }
                },
                |msg| black_box(pipeline.validate(&msg)),
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_replay_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay-cache");
    let policy = ReplayPolicy::for_window(Duration::from_secs(120), 10_000);

    for prefill in [100usize, 10_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("insert", prefill), &prefill, |b, &n| {
            let cache = ReplayCache::new();
            for _ in 0..n {
                let _ = cache.check_and_insert("s", uuid::Uuid::new_v4(), Duration::ZERO, policy);
            }
            b.iter(|| {
                black_box(cache.check_and_insert(
                    "s",
                    uuid::Uuid::new_v4(),
                    Duration::from_secs(1),
                    policy,
                ))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_canonicalize, bench_validate, bench_replay_cache);
criterion_main!(benches);
