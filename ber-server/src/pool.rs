//! Per-worker connection pool.
//!
//! The original implementation hands out connection objects from a
//! free list grown in chunks of 32 up to a hard cap of 256. A tokio
//! runtime already owns per-task allocation, so the bound is realized
//! here as a counting semaphore: accepting a connection acquires a
//! permit (closing the socket immediately if the pool is exhausted,
//! matching the free-list-empty behavior), and the permit is released
//! when the connection's task ends.

use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounds the number of concurrently active connections on one worker.
#[derive(Clone)]
pub struct ConnectionPool {
    semaphore: Arc<Semaphore>,
}

impl ConnectionPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Take a slot for a newly accepted connection, or `None` if the
    /// pool is currently full.
    pub fn try_acquire(&self) -> Option<ConnectionSlot> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| ConnectionSlot { _permit: permit })
    }

    pub fn active_count(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Held for the lifetime of one connection; releases its slot on drop.
pub struct ConnectionSlot {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausted_pool_refuses_further_slots() {
        let pool = ConnectionPool::new(1);
        let first = pool.try_acquire();
        assert!(first.is_some());
        assert!(pool.try_acquire().is_none());
        drop(first);
        assert!(pool.try_acquire().is_some());
    }
}
