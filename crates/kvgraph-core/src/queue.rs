//! Per-composite batching of pending writes.
//!
//! A [`MutationQueue`] holds deferred operations in FIFO order. Nothing is
//! resolved at enqueue time: each operation reads whatever state it needs
//! when it runs, so later operations observe the effects of earlier ones.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::GraphResult;
use crate::object::BoxFuture;

/// A deferred store mutation.
pub type Operation = Box<dyn FnOnce() -> BoxFuture<'static, GraphResult<()>> + Send>;

/// Ordered queue of pending operations owned by one composite.
pub struct MutationQueue {
    /// Base name of the owning composite, for diagnostics.
    owner: String,
    pending: Mutex<VecDeque<Operation>>,
}

impl MutationQueue {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an operation. It runs on the next [`flush`](Self::flush).
    pub fn enqueue<F, Fut>(&self, op: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = GraphResult<()>> + Send + 'static,
    {
        self.pending
            .lock()
            .expect("queue mutex poisoned")
            .push_back(Box::new(move || -> BoxFuture<'static, GraphResult<()>> {
                Box::pin(op())
            }));
    }

    /// Number of operations waiting for the next flush.
    pub fn len(&self) -> usize {
        self.pending.lock().expect("queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every pending operation in order, one at a time.
    ///
    /// The batch is taken out of the queue before the first operation runs,
    /// so the queue is empty afterwards whatever the outcome. The first
    /// failure stops the batch: operations already run stay committed, the
    /// rest are dropped. Operations enqueued while the batch runs wait for
    /// the next flush.
    pub async fn flush(&self) -> GraphResult<()> {
        let batch = {
            let mut pending = self.pending.lock().expect("queue mutex poisoned");
            std::mem::take(&mut *pending)
        };
        if batch.is_empty() {
            return Ok(());
        }

        let total = batch.len();
        debug!(owner = %self.owner, ops = total, "flushing mutation queue");
        for (done, op) in batch.into_iter().enumerate() {
            if let Err(e) = op().await {
                warn!(
                    owner = %self.owner,
                    completed = done,
                    discarded = total - done - 1,
                    error = %e,
                    "flush aborted"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Drop for MutationQueue {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().map(|p| p.len()).unwrap_or(0);
        if pending > 0 {
            warn!(owner = %self.owner, pending, "mutation queue dropped with unflushed operations");
        }
    }
}

impl std::fmt::Debug for MutationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationQueue")
            .field("owner", &self.owner)
            .field("pending", &self.len())
            .finish()
    }
}
