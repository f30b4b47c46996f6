// src/analyze/gate.rs
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Process-wide cap on in-flight backend calls. Build it once at startup and
/// clone the handle; clones share the same permits. Callers over the cap wait
/// for a slot, they are never rejected.
#[derive(Clone, Debug)]
pub struct ConcurrencyGate {
    sem: Arc<Semaphore>,
    capacity: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("concurrency gate closed")]
pub struct GateClosed;

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, GateClosed> {
        self.sem.clone().acquire_owned().await.map_err(|_| GateClosed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.sem.available_permits()
    }
}
