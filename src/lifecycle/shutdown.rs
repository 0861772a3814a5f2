//! Stop signal for the accept loop.
//!
//! Only the accept loop listens; connection tasks already running are left to
//! finish or be dropped with the runtime.

use tokio::sync::broadcast;

/// Broadcasts a one-shot stop request to every subscriber.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver that resolves once [`Shutdown::trigger`] is called.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Ask every subscriber to stop. Calling it with no subscribers is harmless.
    pub fn trigger(&self) {
        let delivered = self.tx.send(()).unwrap_or(0);
        tracing::info!(subscribers = delivered, "Shutdown triggered");
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
