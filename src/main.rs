//! dev-proxy
//!
//! Development server front door built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                  DEV PROXY                    │
//!   Client Request      │  ┌─────────┐    ┌──────────────┐             │
//!   ────────────────────┼─▶│  http   │───▶│   routing    │             │
//!                       │  │ server  │    │ route table  │             │
//!                       │  └─────────┘    └──────┬───────┘             │
//!                       │          ┌─────────────┼──────────────┐      │
//!                       │          ▼             ▼              ▼      │
//!                       │   ┌───────────┐ ┌────────────┐ ┌──────────┐  │
//!                       │   │   local   │ │  forward   │ │websocket │──┼──▶ Backend
//!                       │   │ + define  │ │ (HTTP/1.1) │ │  tunnel  │  │
//!                       │   └───────────┘ └─────┬──────┘ └──────────┘  │
//!                       │                       └───────────────────────┼──▶ Backend
//!                       │                                              │
//!                       │  config · observability · lifecycle          │
//!                       └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::net::TcpListener;

use dev_proxy::config::{load_config, validation::validate_config, ProxyConfig};
use dev_proxy::http::HttpServer;
use dev_proxy::lifecycle::{signals, Shutdown};
use dev_proxy::observability::{logging, metrics};
use dev_proxy::routing::RouteTable;

#[derive(Parser)]
#[command(name = "dev-proxy")]
#[command(about = "Development server with prefix-routed backend proxying", long_about = None)]
struct Cli {
    /// TOML configuration file. Without one, the standard /ws + /api rules are used.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override server.bind_address.
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Override observability.log_level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dev server (default)
    Serve,
    /// Print the routing decision for a path without starting a server
    Route {
        /// Request path, e.g. /api/users
        path: String,
        /// Treat the request as a WebSocket upgrade
        #[arg(long)]
        upgrade: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("dev-proxy: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Some(Commands::Route { path, upgrade }) => print_route(&config, &path, upgrade),
        Some(Commands::Serve) | None => serve(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dev-proxy: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_config(cli: &Cli) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::standard(),
    };

    if let Some(bind) = &cli.bind {
        config.server.bind_address = bind.clone();
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    // Overrides bypass the loader, so check again.
    validate_config(&config).map_err(|errors| {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    })?;
    Ok(config)
}

fn print_route(config: &ProxyConfig, path: &str, upgrade: bool) -> Result<(), Box<dyn std::error::Error>> {
    let table = RouteTable::from_config(&config.proxy)?;

    let output = match table.resolve(path, upgrade)? {
        Some(decision) => json!({
            "match": true,
            "prefix": decision.rule().prefix(),
            "target": decision.target().as_str(),
            "final_path": decision.final_path(),
            "forward_as_upgrade": decision.forward_as_upgrade(),
            "tunnel": decision.tunnel(),
            "change_origin": decision.rule().change_origin(),
        }),
        None => json!({ "match": false, "served": "local" }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn serve(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    logging::init(&config.observability)?;

    tracing::info!("dev-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.server.bind_address,
        rules = config.proxy.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Address already checked by validation.
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
