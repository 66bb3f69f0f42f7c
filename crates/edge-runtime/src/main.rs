//! # Edge Runtime
//!
//! Entry point of the edge validator.
//!
//! ## Commands
//!
//! - `validate` - read JSON-lines telemetry, validate it, print accepted
//!   readings as JSON lines on stdout, optionally relay alerts to a file
//! - `seal` - act as a sensor: print signed (optionally encrypted) readings
//! - `check-config` - load configuration and keys, report, exit
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then environment overrides)
//! 2. Validate configuration and build the key store; any key problem is fatal
//! 3. Build the pipeline and its adapters
//! 4. Dispatch input per source until EOF or Ctrl+C
//! 5. Drain lanes, emit the shutdown event, print the summary

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use edge_runtime::{
    build_key_store, recent_alerts, relay_alerts, seal_batch, subscribe_alerts, EdgeConfig,
    EdgeContainer, SealRequest, SourceDispatcher, DEFAULT_ALERT_SEVERITY,
};
use edge_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use edge_validation::TelemetryValidationApi;
use shared_types::{ForwardedTelemetry, KeyProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Edge validator for IoT telemetry
#[derive(Parser, Debug)]
#[command(name = "edge-runtime")]
#[command(about = "Validates signed IoT telemetry before it is forwarded to the cloud")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "EDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides EDGE_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate JSON-lines telemetry
    Validate {
        /// Input file, `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Print Prometheus metrics to stderr on exit
        #[arg(long)]
        metrics: bool,

        /// Write error and critical security events to this file as JSON lines
        #[arg(long)]
        alerts: Option<PathBuf>,
    },

    /// Produce signed readings for a configured source
    Seal {
        /// Source id (must have keys in the configuration)
        #[arg(short, long)]
        source: String,

        /// Reading kind, e.g. temperature
        #[arg(short, long, default_value = "temperature")]
        kind: String,

        /// Reading value
        #[arg(short, long)]
        value: f64,

        /// Unit of the value
        #[arg(short, long)]
        unit: Option<String>,

        /// Encrypt the reading with the source's AEAD key
        #[arg(long)]
        encrypt: bool,

        /// Number of readings to print, each with a fresh nonce
        #[arg(long, default_value = "1")]
        count: u32,

        /// Backdate the timestamp by this many seconds
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        age_secs: i64,
    },

    /// Load configuration and keys, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &cli.log_level {
        telemetry = telemetry.with_log_level(level);
    }
    if cli.json_logs {
        telemetry = telemetry.with_json(true);
    }
    let _telemetry = init_telemetry(telemetry).context("failed to initialize telemetry")?;

    let config = EdgeConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Validate {
            input,
            metrics,
            alerts,
        } => run_validate(config, &input, metrics, alerts).await,
        Command::Seal {
            source,
            kind,
            value,
            unit,
            encrypt,
            count,
            age_secs,
        } => run_seal(
            &config,
            &SealRequest {
                source,
                kind,
                value,
                unit,
                encrypt,
                count,
                age_secs,
            },
        ),
        Command::CheckConfig => run_check_config(&config),
    }
}

async fn run_validate(
    config: EdgeConfig,
    input: &str,
    metrics: bool,
    alerts: Option<PathBuf>,
) -> Result<()> {
    let dispatch = config.dispatch;
    let window = Duration::from_secs(config.pipeline.freshness.window_secs);
    let (container, forwarded) =
        EdgeContainer::build(config).context("failed to build validation pipeline")?;

    let relay = match alerts {
        Some(path) => {
            let file = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("cannot create alert file {}", path.display()))?;
            let stream = subscribe_alerts(&container.bus, DEFAULT_ALERT_SEVERITY);
            Some(tokio::spawn(relay_alerts(stream, tokio::io::BufWriter::new(file))))
        }
        None => None,
    };

    container.service.announce_startup().await;
    let printer = tokio::spawn(print_forwarded(forwarded));

    // Periodic replay cache sweep, one window apart.
    let sweeper = {
        let pipeline = Arc::clone(container.pipeline());
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(window);
            tick.tick().await;
            loop {
                tick.tick().await;
                pipeline.sweep_expired();
            }
        })
    };

    let mut dispatcher = SourceDispatcher::new(Arc::clone(&container.service), dispatch);
    let reader = open_input(input).await?;
    tokio::select! {
        result = dispatcher.run_lines(reader) => {
            let lines = result.context("failed while reading input")?;
            info!(lines, "Input complete");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, draining queued messages");
        }
    }

    let lanes = dispatcher.finish().await;
    sweeper.abort();
    container.service.announce_shutdown().await;

    let stats = container.pipeline().stats();
    let summary = serde_json::json!({
        "stats": stats,
        "lanes": lanes.len(),
        "rate_limits": container.pipeline().rate_stats(),
        "recent_alerts": recent_alerts(&container.bus, DEFAULT_ALERT_SEVERITY, 10),
    });
    // Last bus handle; lets the alert relay finish.
    drop(container);

    let written = printer
        .await
        .context("output task panicked")?
        .context("failed to write output")?;
    info!(written, "Forwarded readings written");
    if let Some(relay) = relay {
        let relayed = relay
            .await
            .context("alert task panicked")?
            .context("failed to write alerts")?;
        info!(relayed, "Alerts written");
    }

    eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    if metrics {
        eprintln!("{}", encode_metrics().context("failed to encode metrics")?);
    }
    Ok(())
}

async fn open_input(input: &str) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("cannot open input {input}"))?;
    Ok(Box::new(BufReader::new(file)))
}

async fn print_forwarded(mut forwarded: mpsc::Receiver<ForwardedTelemetry>) -> Result<u64> {
    let mut stdout = tokio::io::stdout();
    let mut written = 0u64;
    while let Some(telemetry) = forwarded.recv().await {
        let mut line = serde_json::to_vec(&telemetry)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        written += 1;
    }
    stdout.flush().await?;
    Ok(written)
}

fn run_seal(config: &EdgeConfig, request: &SealRequest) -> Result<()> {
    let store = build_key_store(&config.keys).context("failed to load key material")?;
    let batch = seal_batch(store.as_ref(), request, Utc::now())
        .with_context(|| format!("cannot seal readings for {}", request.source))?;
    for message in batch {
        println!("{}", message.to_json()?);
    }
    Ok(())
}

fn run_check_config(config: &EdgeConfig) -> Result<()> {
    let store = build_key_store(&config.keys).context("failed to load key material")?;
    let report = serde_json::json!({
        "sources": store.sources(),
        "pipeline": config.pipeline,
        "dispatch": config.dispatch,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    info!(sources = store.source_count(), "Configuration OK");
    Ok(())
}
