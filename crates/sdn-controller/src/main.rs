//! Diamond SDN Controller - Main Entry Point
//!
//! Runs the controller against the emulated diamond fabric.

use anyhow::Context;
use clap::Parser;
use sdn_controller::{ControllerConfig, ControllerRuntime, EmulatedFabric};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sdn-controller")]
#[command(version)]
#[command(about = "Delay-aware intent routing controller", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short, env = "SDN_CONTROLLER_CONFIG")]
    config: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Override the emulated path delays in ms, as A,B,C
    #[arg(long, value_delimiter = ',')]
    emulate_delays: Option<Vec<u64>>,
}

/// Per-path delays from the `A,B,C` list
fn path_delays(values: &[u64]) -> anyhow::Result<[u64; 3]> {
    match values {
        &[a, b, c] => Ok([a, b, c]),
        other => anyhow::bail!("--emulate-delays takes three values A,B,C, got {}", other.len()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ControllerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    if let Some(values) = &cli.emulate_delays {
        let [a, b, c] = path_delays(values)?;
        config.emulator.path_a_delay_ms = a;
        config.emulator.path_b_delay_ms = b;
        config.emulator.path_c_delay_ms = c;
        config.validate()?;
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Diamond SDN Controller v{}", env!("CARGO_PKG_VERSION"));
    if cli.config.is_none() {
        tracing::warn!("No config given, using defaults");
    }

    let (events_tx, events_rx) = mpsc::channel(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let fabric = Arc::new(EmulatedFabric::new(config.emulator.clone(), events_tx));
    let runtime = ControllerRuntime::new(&config, fabric.clone(), events_rx, shutdown_rx);
    let controller = tokio::spawn(runtime.run());

    fabric.connect_all().await?;

    match cli.duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await?,
    }
    shutdown_tx.send(true)?;

    let controller = controller.await?;
    println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
    Ok(())
}
