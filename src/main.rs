//! Forward proxy binary.
//!
//! ```text
//!   client ──▶ listener ──▶ admission slot ──▶ handler task ──▶ origin
//!          ◀────────────────── relay ◀──────────────────────────┘
//! ```

use std::net::SocketAddr;

use clap::Parser;

use forward_proxy::cli::Cli;
use forward_proxy::lifecycle::{resolve_config, signals, StartupError};
use forward_proxy::net::Listener;
use forward_proxy::observability::{logging, metrics};
use forward_proxy::{ProxyServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.listener.port,
        max_connections = config.listener.max_connections,
        buffer_bytes = config.limits.buffer_bytes,
        "forward-proxy starting"
    );

    if config.observability.metrics_enabled {
        // Validation guarantees the address parses.
        if let Ok(addr) = config.observability.metrics_address.parse::<SocketAddr>() {
            metrics::init_metrics(addr)?;
        }
    }

    let listener = Listener::bind(&config.listener)?;
    let server = ProxyServer::new(&config);

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    signals::wait_for_signal().await?;
    shutdown.trigger();

    match server_task.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "Accept loop task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
