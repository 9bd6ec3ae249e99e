//! Ledger Gateway
//!
//! HTTP front end for an asynchronous ledger core node.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                LEDGER GATEWAY                 │
//!                    │                                               │
//!   HTTP Request     │  ┌─────────┐   ┌──────────┐   ┌──────────┐  │
//!   ─────────────────┼─▶│  http   │──▶│ session  │──▶│   core   │──┼──▶ Core
//!                    │  │ handlers│   │   gate   │   │  client  │  │    Node
//!                    │  └─────────┘   └──────────┘   └────┬─────┘  │
//!                    │       ▲                            │        │
//!                    │       │    ┌────────────┐    ┌─────▼─────┐  │
//!   HTTP Response    │  ┌────┴───┐│ correlator │◀───│  inbound  │◀─┼─── tagged
//!   ◀────────────────┼──│assemble││ (per-query ││   │  reader   │  │    responses
//!                    │  └────────┘│  waiters)  │    └───────────┘  │
//!                    │            └────────────┘                   │
//!                    │                                              │
//!                    │  config · observability · lifecycle          │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_gateway::config::loader::load_config;
use ledger_gateway::config::GatewayConfig;
use ledger_gateway::core::client::CoreClient;
use ledger_gateway::http::HttpServer;
use ledger_gateway::lifecycle::Shutdown;
use ledger_gateway::observability::metrics;

/// HTTP gateway for a ledger core node.
#[derive(Debug, Parser)]
#[command(name = "ledger-gateway", version)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP bind address, overriding the config file.
    #[arg(long)]
    bind: Option<String>,

    /// Core node host, overriding the config file.
    #[arg(long)]
    core_host: Option<String>,

    /// Core node TCP port, overriding the config file.
    #[arg(long)]
    core_port: Option<u16>,
}

impl Args {
    fn into_config(self) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => GatewayConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(host) = self.core_host {
            config.core.host = host;
        }
        if let Some(port) = self.core_port {
            config.core.port = port;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ledger-gateway v0.1.0 starting");

    let config = Args::parse().into_config()?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        core_host = %config.core.host,
        core_port = config.core.port,
        query_timeout_secs = config.timeouts.query_secs,
        "Configuration loaded"
    );

    // Metrics exporter
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // The single shared connection to the core node. Startup fails fast
    // if the core is unreachable.
    let client: Arc<CoreClient> = CoreClient::connect(&config.core, &config.timeouts).await?;

    // Bind HTTP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, client);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
