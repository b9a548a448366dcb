//! Ledger host binary
//!
//! Opens the store, optionally seeds the demo dataset, and keeps the
//! ledger running until interrupted.

use anyhow::Context;
use gonav_ledger::{Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Fanm Gonav ledger");

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => Config::from_env().context("reading GONAV_* environment")?,
    };
    let seed_on_start = config.demo.seed_on_start;

    // Open ledger
    let ledger = Ledger::open(config).await.context("opening ledger")?;

    if seed_on_start && ledger.seed_demo_data().await? {
        tracing::info!("Demo data loaded");
    }

    let status = ledger.status();
    tracing::info!(
        pending = status.pending_changes,
        online = status.is_online,
        "Ledger ready"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger");
    ledger.shutdown().await?;
    Ok(())
}
