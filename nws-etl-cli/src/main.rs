//! Binary crate for the `nws-etl` command-line tool.
//!
//! This crate focuses on:
//! - Triggering a single ETL run (for cron, systemd timers or an orchestrator)
//! - Interactive configuration
//! - Read-only replay of stored raw payloads

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries the summary line and replay output only
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
