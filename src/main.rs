//! Load-balancing gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────────┐
//!                       │                     GATEWAY                       │
//!                       │                                                   │
//!   Client Request      │  ┌────────┐   ┌──────────────┐   ┌──────────────┐ │
//!   ────────────────────┼─▶│  http  │──▶│ response_log │──▶│ load_balance │ │
//!                       │  │ server │   │  (order -1)  │   │  (order MAX) │ │
//!                       │  └────────┘   └──────────────┘   └──────┬───────┘ │
//!                       │                                         │         │
//!                       │                                         ▼         │
//!   Client Response     │  ┌────────┐   ┌──────────────┐   ┌──────────────┐ │
//!   ◀───────────────────┼──│  sink  │◀──│  intercept   │◀──│   forward    │◀┼── Upstream
//!                       │  └────────┘   └──────────────┘   └──────────────┘ │
//!                       └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use lb_gateway::config::{load_config, validation::validate_config, ConfigError, GatewayConfig};
use lb_gateway::lifecycle::{wait_for_shutdown_signal, Shutdown};
use lb_gateway::observability::{logging, metrics};
use lb_gateway::GatewayServer;

#[derive(Debug, Parser)]
#[command(name = "lb-gateway", version, about = "Round-robin HTTP gateway")]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lb-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstreams = config.upstreams.addresses.len(),
        strip_prefix = %config.load_balance.strip_prefix,
        intercept_mode = ?config.intercept.mode,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::from_config(config)?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
