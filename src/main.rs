//! Edge relay server.
//!
//! ```text
//!     Client ──▶ listener ──▶ http server ──▶ router
//!                                               │
//!               ┌────────────┬──────────────────┼──────────────┐
//!               ▼            ▼                  ▼              ▼
//!          preflight   ws relay session    api delegate   static assets
//!                            │
//!                            ▼
//!                     upstream wss://
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use edge_relay::config::{load_config, validate_config, RelayConfig};
use edge_relay::lifecycle::signals;
use edge_relay::observability::{logging, metrics};
use edge_relay::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "edge-relay")]
#[command(about = "Edge router with a WebSocket relay", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("config error: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    logging::init_logging(&config.observability);
    tracing::info!("edge-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.endpoint,
        assets_root = %config.assets.root,
        max_sessions = config.relay.max_sessions,
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
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let grace = Duration::from_secs(config.timeouts.shutdown_grace_secs);
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.clone())?;
    let sessions = server.sessions().clone();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener).await?;

    if sessions.wait_for_drain(grace).await {
        tracing::info!("All relay sessions closed");
    } else {
        tracing::warn!(
            remaining = sessions.active_count(),
            "Grace period elapsed with relay sessions still open"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
