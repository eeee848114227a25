//! flow-gateway
//!
//! Loads flow definitions, keeps them live across config edits, and runs
//! transactions through them.
//!
//! # Architecture Overview
//!
//! ```text
//!     ApiStream (request)
//!     ─────────────────────▶ selector ──▶ system_start ──▶ user flows ──▶ system_end
//!                                               │               │
//!                                               ▼               ▼
//!                                          processors ──▶ StreamActions ──▶ transport
//!
//!     ApiStream (response)
//!     ─────────────────────▶ system_end ──▶ user flows ──▶ system_start   (reverse)
//!
//!     Cross-cutting: config (+ hot reload), context stores, metrics, logging
//! ```

use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use flow_gateway::clock::SystemClock;
use flow_gateway::config::{load_config, ConfigWatcher, GatewayConfig};
use flow_gateway::lifecycle::{shutdown_signal, Shutdown};
use flow_gateway::observability::{init_logging, metrics, metrics_facade_observer, MetricsCollector};
use flow_gateway::processors::ProcessorRegistry;
use flow_gateway::runtime::{ApiStream, Runtime};

#[derive(Parser)]
#[command(name = "flow-gateway")]
#[command(about = "Flow graph composition and execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configuration and keep it live until stopped
    Run {
        #[arg(short, long, default_value = "flow-gateway.toml")]
        config: PathBuf,
    },
    /// Build every flow without serving anything
    Validate {
        #[arg(short, long, default_value = "flow-gateway.toml")]
        config: PathBuf,
    },
    /// Run one JSON-encoded transaction through the flows and print the actions
    Simulate {
        #[arg(short, long, default_value = "flow-gateway.toml")]
        config: PathBuf,

        #[arg(short, long)]
        transaction: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::Validate { config } => validate(&config),
        Commands::Simulate { config, transaction } => simulate(&config, &transaction).await,
    }
}

fn runtime_for(config: &GatewayConfig) -> Runtime {
    let metrics = Arc::new(MetricsCollector::new(config.metrics.channel_capacity));
    Runtime::new(ProcessorRegistry::with_builtins(Arc::new(SystemClock)), metrics)
}

async fn run(path: &Path) -> Result<(), Box<dyn Error>> {
    let config = load_config(path)?;
    init_logging(&config.logging)?;

    tracing::info!("flow-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    let runtime = runtime_for(&config);
    let workers = runtime.metrics().spawn();

    if config.metrics.enabled {
        runtime.metrics().register_observer(metrics_facade_observer());
        if let Some(address) = &config.metrics.prometheus_address {
            let addr: SocketAddr = address.parse()?;
            metrics::init_exporter(addr)?;
        }
    }

    runtime.load(&config)?;
    tracing::info!(
        flows = runtime.snapshot().flow_names().len(),
        quotas = config.quotas.len(),
        "Configuration loaded"
    );

    let (watcher, mut updates) = ConfigWatcher::new(path);
    let _watcher = watcher.run()?;

    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal.trigger();
    });

    loop {
        tokio::select! {
            Some(update) = updates.recv() => match runtime.load(&update) {
                Ok(()) => tracing::info!(flows = runtime.snapshot().flow_names().len(), "Configuration reloaded"),
                Err(e) => tracing::error!(error = %e, "Failed to build flows. Keeping current configuration."),
            },
            _ = stop.recv() => break,
        }
    }

    for worker in workers {
        worker.abort();
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn validate(path: &Path) -> Result<(), Box<dyn Error>> {
    let config = load_config(path)?;
    let snapshot = runtime_for(&config).build(&config)?;
    println!("{}: {} flows OK", path.display(), snapshot.flow_names().len());
    for (flow, requirement) in snapshot.requirements() {
        println!(
            "  {} (body: {}, request capture: {})",
            flow, requirement.body_required, requirement.request_capture_required
        );
    }
    Ok(())
}

async fn simulate(path: &Path, transaction: &Path) -> Result<(), Box<dyn Error>> {
    let config = load_config(path)?;
    init_logging(&config.logging)?;

    let runtime = runtime_for(&config);
    runtime.load(&config)?;

    let raw = std::fs::read_to_string(transaction)?;
    let mut stream: ApiStream = serde_json::from_str::<ApiStream>(&raw)?.normalize();
    let actions = runtime.execute_flow(&mut stream).await;

    println!("{}", serde_json::to_string_pretty(&actions)?);
    Ok(())
}
