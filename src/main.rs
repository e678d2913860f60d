//! mox: a programmable HTTP proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                     MOX                       │
//!     Client Request       │  ┌─────────┐    ┌─────────┐    ┌──────────┐  │
//!     ─────────────────────┼─▶│  http   │───▶│ routing │───▶│ pipeline │  │
//!                          │  │ server  │    │ (match) │    │ (chain)  │  │
//!                          │  └─────────┘    └────┬────┘    └────┬─────┘  │
//!                          │        no match      │              │ trigger│
//!                          │        ┌─────────────┘              ▼        │
//!                          │        ▼                      ┌──────────┐   │
//!                          │  ┌─────────────┐              │ upstream │◀──┼──▶ Target
//!                          │  │ passthrough │◀─────────────│dispatcher│   │    Server
//!                          │  └─────────────┘              └──────────┘   │
//!     Client Response      │                                              │
//!     ◀────────────────────┼── body codec ◀── response-phase transformers │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mox::lifecycle::{prepare_config, signals, Overrides, Shutdown};
use mox::observability::{logging, metrics};
use mox::MoxServer;

/// Programmable HTTP proxy: route requests through transform chains.
#[derive(Debug, Parser)]
#[command(name = "mox", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream base URL (overrides `target_url`)
    #[arg(short, long)]
    target: Option<String>,

    /// Listen address (overrides `listener.bind_address`)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = prepare_config(
        cli.config.as_deref(),
        Overrides {
            target_url: cli.target,
            bind_address: cli.bind,
        },
    )?;

    logging::init(&config.observability);
    tracing::info!("mox v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        target_url = %config.target_url,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = MoxServer::new(config)?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(signals::forward_to(shutdown));

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
