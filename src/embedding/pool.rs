/// Bounded worker pool for blocking model inference
use crate::error::{Result, RetrievalError};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs CPU-bound inference on tokio's blocking threads, at most
/// `max_concurrent` tasks at a time, so request handling never stalls.
#[derive(Clone)]
pub struct InferencePool {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl InferencePool {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Run `task` off the async executor.
    ///
    /// The permit moves into the blocking task, so an abandoned caller does
    /// not free capacity until the inference actually finishes.
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RetrievalError::Cancelled("inference pool closed".to_string()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        })
        .await
        .map_err(|e| {
            if e.is_panic() {
                RetrievalError::Other(anyhow::anyhow!("inference task panicked: {}", e))
            } else {
                RetrievalError::Cancelled(e.to_string())
            }
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for InferencePool {
    fn default() -> Self {
        Self::new(2)
    }
}
