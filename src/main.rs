//! Intercepting reverse proxy.
//!
//! ```text
//!     Client Request
//!     ─────────────▶ guardrails ─▶ routing ─▶ access ─▶ forwarder ─────▶ Origin
//!                                                          │
//!     Client Response                                      ▼
//!     ◀───────────── CaptureBody ◀──────────────────── origin body
//!                         │
//!                         ▼
//!                  ExchangeLogger ─▶ ExchangeStore
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use intercept_proxy::config::{loader, ConfigWatcher};
use intercept_proxy::http::HttpServer;
use intercept_proxy::lifecycle::{wait_for_signal, Shutdown};
use intercept_proxy::observability::{logging, metrics};
use intercept_proxy::store::{MemoryStore, Stores};

#[derive(Parser)]
#[command(name = "intercept-proxy")]
#[command(about = "Reverse proxy that captures every exchange for audit", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => loader::load_config(path)?,
        None => loader::default_config()?,
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "intercept-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        access_mode = config.access.mode.as_str(),
        max_body_bytes = config.guardrails.max_body_bytes,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(match &config.store.snapshot_path {
        Some(path) => MemoryStore::load_from_file(path, config.store.max_records_per_route)?,
        None => MemoryStore::new(config.store.max_records_per_route, None),
    });

    // Watcher handle must outlive the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config, Stores::in_memory(store.clone()));
    let server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => tracing::info!(signal = name, "Signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
        }
        signal_shutdown.trigger();
    });

    server_task.await??;

    if let Err(e) = store.save_to_file() {
        tracing::error!(error = %e, "Failed to save store snapshot");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
