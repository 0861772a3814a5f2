//! Connection identity and admission slots.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Bound the number of concurrently handled connections
//! - Release a connection's slot exactly once, on every exit path

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Fixed pool of admission slots shared by the accept loop and its handlers.
///
/// Cloning yields another handle to the same pool.
#[derive(Debug, Clone)]
pub struct Admission {
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl Admission {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    ///
    /// Fails only if the pool has been closed.
    pub async fn acquire(&self) -> Result<AdmissionSlot, AcquireError> {
        let permit = self.slots.clone().acquire_owned().await?;
        metrics::slot_acquired();
        Ok(AdmissionSlot {
            _permit: permit,
            id: ConnectionId::new(),
        })
    }

    /// Take a slot only if one is free right now.
    #[cfg(test)]
    pub fn try_acquire(&self) -> Option<AdmissionSlot> {
        let permit = self.slots.clone().try_acquire_owned().ok()?;
        metrics::slot_acquired();
        Some(AdmissionSlot {
            _permit: permit,
            id: ConnectionId::new(),
        })
    }

    /// Stop handing out slots; pending and future acquisitions fail.
    #[cfg(test)]
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Number of slots currently held.
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }
}

/// A held admission slot. Dropping it returns the slot to the pool.
///
/// The slot is moved into the connection task, so it is released even if the
/// handler panics.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
    id: ConnectionId,
}

impl AdmissionSlot {
    /// ID of the connection this slot was granted to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        metrics::slot_released();
        tracing::trace!(connection_id = %self.id, "Admission slot released");
    }
}
