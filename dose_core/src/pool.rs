//! Bounded worker pool for per-medicine checks.
//!
//! At most `capacity` jobs run at once, each on a blocking-capable thread so a
//! slow store call cannot stall the runtime. Further jobs wait for a permit.
//! No ordering between jobs is guaranteed.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

/// Default number of concurrent execution units
pub const DEFAULT_WORKER_COUNT: usize = 4;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    capacity: usize,
}

impl WorkerPool {
    /// Create a pool; a capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            tracker: TaskTracker::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs submitted but not yet finished (queued or running)
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Queue a job and return immediately. Must be called inside a tokio runtime.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tracker.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!("Worker pool closed, dropping job");
                    return;
                }
            };
            if let Err(e) = tokio::task::spawn_blocking(job).await {
                tracing::error!("Worker job failed: {}", e);
            }
        });
    }

    /// Wait until every job submitted so far has finished
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_COUNT)
    }
}
