//! Live proxy gateway.
//!
//! Forwards `/{prefix}/{target-url}` requests to the embedded target and
//! rewrites headers so a browser-hosted archive replay client can read the
//! response across origins.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server ──▶ proxy::Gateway ──┬─▶ OPTIONS: http::preflight
//!                     (request id,     (dispatch)       ├─▶ other paths: not found
//!                      trace, timeout)                  │
//!                                                       ▼
//!                                         target ─▶ headers ─▶ fetcher ─▶ transport ──▶ Upstream
//!                                                                 │
//!     Client Response                                             ▼
//!     ◀──────────────────────────────────────────────────────  compose
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use live_proxy::config::{load_config, GatewayConfig};
use live_proxy::lifecycle::{signals, Shutdown};
use live_proxy::observability::{logging, metrics};
use live_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "live-proxy")]
#[command(about = "CORS-relaxing live proxy for web archive replay", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
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
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability);

    tracing::info!("live-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        prefix = %config.proxy.prefix,
        max_redirect_hops = config.proxy.max_redirect_hops,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
