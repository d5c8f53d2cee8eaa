//! Task pool: admission control for per-connection execution units.
//!
//! Every unit holds one semaphore permit for its lifetime. When the pool
//! is full, `spawn` fails immediately instead of queueing; callers shed the
//! work (the server closes the socket). Units are never cancelled.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tracing::Instrument;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("pool at capacity ({limit} units)")]
    AtCapacity { limit: usize },
    #[error("pool closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    bounded: bool,
}

impl TaskPool {
    /// `max_units == 0` means no cap beyond host memory.
    pub fn new(max_units: usize) -> Self {
        let (capacity, bounded) = match max_units {
            0 => (Semaphore::MAX_PERMITS, false),
            n => (n, true),
        };
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            bounded,
        }
    }

    /// Spawn `unit` if a slot is free. The permit is released when the
    /// unit returns or panics.
    pub fn spawn<F>(&self, name: &str, unit: F) -> Result<JoinHandle<()>, SpawnError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(TryAcquireError::NoPermits) => {
                return Err(SpawnError::AtCapacity {
                    limit: self.capacity,
                })
            }
            Err(TryAcquireError::Closed) => return Err(SpawnError::Closed),
        };

        let span = tracing::info_span!("unit", name);
        Ok(tokio::spawn(
            async move {
                let _permit = permit;
                unit.await;
            }
            .instrument(span),
        ))
    }

    /// Units currently running.
    pub fn active(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        self.bounded.then_some(self.capacity)
    }

    /// Reject all further spawns. Running units are unaffected.
    pub fn close(&self) {
        self.permits.close();
    }
}
