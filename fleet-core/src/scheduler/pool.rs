//! Worker Pool: bounds concurrency across all job firings with a resizable
//! semaphore-backed budget (grounded on the teacher's `ConnectorPool`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::instrument;

use crate::error::{FleetError, FleetResult};

pub const MIN_POOL_SIZE: usize = 1;
pub const MAX_POOL_SIZE: usize = 10_000;

/// One slot of the bounded concurrency budget, held for the duration of one
/// per-host operation. Releasing is non-blocking (the `Drop` impl of the
/// underlying permit).
pub struct WorkerSlot(#[allow(dead_code)] OwnedSemaphorePermit);

/// Advisory snapshot of pool occupancy.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    pub size: usize,
    pub active: usize,
    pub available: usize,
}

/// Bounded concurrency budget shared by every in-flight per-host action
/// call. Resize is safe under load: shrinking never aborts running work,
/// and a grow is immediately visible to new acquirers.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: AtomicUsize,
}

fn validate_size(size: usize) -> FleetResult<()> {
    if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&size) {
        return Err(FleetError::BadRequest(format!(
            "workerPoolSize {size} must be in [{MIN_POOL_SIZE}, {MAX_POOL_SIZE}]"
        )));
    }
    Ok(())
}

impl WorkerPool {
    pub fn new(size: usize) -> FleetResult<Self> {
        validate_size(size)?;
        Ok(WorkerPool {
            semaphore: Arc::new(Semaphore::new(size)),
            size: AtomicUsize::new(size),
        })
    }

    /// Blocks until a slot frees up.
    pub async fn acquire(&self) -> WorkerSlot {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed");
        WorkerSlot(permit)
    }

    /// Resizes the pool. Growing adds permits immediately; shrinking
    /// forgets permits as they become available without blocking or
    /// cancelling work already holding a slot.
    #[instrument(skip(self))]
    pub fn resize(&self, new_size: usize) -> FleetResult<()> {
        validate_size(new_size)?;
        let old_size = self.size.swap(new_size, Ordering::SeqCst);
        if new_size > old_size {
            self.semaphore.add_permits(new_size - old_size);
        } else if new_size < old_size {
            self.semaphore.forget_permits(old_size - new_size);
        }
        Ok(())
    }

    pub fn status(&self) -> PoolStatus {
        let size = self.size.load(Ordering::SeqCst);
        let available = self.semaphore.available_permits();
        PoolStatus {
            size,
            active: size.saturating_sub(available),
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rejects_out_of_range_size() {
        assert!(WorkerPool::new(0).is_err());
        assert!(WorkerPool::new(10_001).is_err());
        assert!(WorkerPool::new(1).is_ok());
    }

    #[tokio::test]
    async fn acquire_bounds_concurrency() {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let first = pool.acquire().await;
        let second = pool.acquire().await;
        assert_eq!(pool.status().available, 0);

        let pool_clone = pool.clone();
        let waiter = tokio::spawn(async move {
            let _slot = pool_clone.acquire().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        drop(second);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn shrink_does_not_abort_running_slots() {
        let pool = WorkerPool::new(3).unwrap();
        let held = pool.acquire().await;
        pool.resize(1).unwrap();
        assert_eq!(pool.status().size, 1);
        // the held slot is unaffected by the resize
        drop(held);
    }

    #[test]
    fn invariant_active_plus_available_equals_size() {
        let pool = WorkerPool::new(5).unwrap();
        let status = pool.status();
        assert_eq!(status.active + status.available, status.size);
    }
}
