//! Accept loop and admission control.
//!
//! # Responsibilities
//! - Accept client connections, retrying on transient accept failures
//! - Wait for an admission slot before starting each connection
//! - Spawn one task per connection; never wait for a request to finish
//! - Stop accepting when the shutdown signal fires (in-flight tasks are abandoned)

use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::http::handler::ConnectionHandler;
use crate::net::{Admission, Listener};
use crate::observability::metrics;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// The forward proxy server.
pub struct ProxyServer {
    admission: Admission,
    handler: ConnectionHandler,
}

impl ProxyServer {
    /// Create a server with the given configuration.
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            admission: Admission::new(config.listener.max_connections),
            handler: ConnectionHandler::from_config(config),
        }
    }

    /// Handle to the admission pool, for inspecting slot usage.
    pub fn admission(&self) -> Admission {
        self.admission.clone()
    }

    /// Run the accept loop until `shutdown` fires.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_connections = self.admission.capacity(),
            "Proxy server accepting connections"
        );

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        back_off_after_accept_error(&e).await;
                        continue;
                    }
                },
            };
            metrics::record_accepted();

            let slot = tokio::select! {
                _ = shutdown.recv() => break,
                slot = self.admission.acquire() => match slot {
                    Ok(slot) => slot,
                    Err(_) => {
                        tracing::error!("Admission pool closed");
                        break;
                    }
                },
            };
            tracing::debug!(
                connection_id = %slot.id(),
                peer_addr = %peer,
                available_slots = self.admission.available(),
                "Admission slot acquired"
            );

            let handler = self.handler.clone();
            let span = tracing::info_span!("connection", id = %slot.id(), peer = %peer);
            tokio::spawn(
                async move {
                    let started = Instant::now();
                    let outcome = handler.handle(stream).await;
                    tracing::info!(
                        outcome = outcome.label(),
                        reason = outcome.reason(),
                        relayed_bytes = outcome.relayed_bytes(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Connection closed"
                    );
                    metrics::record_outcome(
                        outcome.label(),
                        outcome.reason(),
                        outcome.relayed_bytes(),
                        started,
                    );
                    drop(slot);
                }
                .instrument(span),
            );
        }

        tracing::info!("Proxy server stopped accepting");
        Ok(())
    }
}

/// Record a failed accept and pause before the next one, so persistent
/// failures such as EMFILE do not spin the loop.
async fn back_off_after_accept_error(error: &impl std::fmt::Display) {
    tracing::warn!(error = %error, "Accept failed, retrying");
    metrics::record_accept_error();
    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accept_error_pauses_before_retry() {
        let error = std::io::Error::from_raw_os_error(24);
        let started = Instant::now();
        back_off_after_accept_error(&error).await;
        assert!(started.elapsed() >= ACCEPT_RETRY_DELAY);
    }
}
