//! Global cap on concurrent provider calls.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate acquired around every external LLM call. Acquisitions
/// block until a permit is free; the permit releases on drop, so every
/// exit path (success, error, or cancellation) returns it.
#[derive(Clone)]
pub struct LlmGate {
    permits: Arc<Semaphore>,
}

impl LlmGate {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_inflight)),
        }
    }

    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        // The semaphore is never closed.
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("llm gate semaphore closed")
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
