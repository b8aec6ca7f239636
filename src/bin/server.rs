//! Fixture region server binary
//!
//! Run with: cargo run --bin region-server -- --help

use anyhow::Result;
use clap::Parser;
use region_probe::server::{run_server, ServerConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "region-server")]
#[command(about = "In-memory region server for exercising region-probe")]
struct Args {
    /// Server node ID
    #[arg(long, default_value = "0")]
    node_id: u32,

    /// gRPC listen address
    #[arg(long, default_value = "[::1]:10334")]
    listen_addr: String,

    /// JSON file with initial regions: {"region": {"key": "value"}}
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Require clients to present this bearer token
    #[arg(long)]
    auth_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of worker threads for processing requests
    #[arg(long, default_value = "2")]
    worker_threads: usize,
}

async fn run_with_config(args: Args) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = ServerConfig {
        node_id: args.node_id,
        listen_addr: args.listen_addr.clone(),
        seed: args.seed.clone(),
        auth_token: args.auth_token.clone(),
    };

    tracing::info!("=== Region Server Configuration ===");
    tracing::info!("Worker threads: {}", args.worker_threads);
    tracing::info!("Listen address: {}", args.listen_addr);
    tracing::info!("Node ID: {}", args.node_id);
    tracing::info!(
        "Seed: {}",
        args.seed
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    tracing::info!("Auth: {}", if args.auth_token.is_some() { "bearer token" } else { "open" });
    tracing::info!("===================================");

    run_server(config).await
}

fn main() -> Result<()> {
    let args = Args::parse();
    let worker_threads = args.worker_threads;

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?
        .block_on(run_with_config(args))
}
