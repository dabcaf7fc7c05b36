//! The handle for one claimed job.
//!
//! A `UnitOfWork` is a plain immutable pair of queue key and raw payload;
//! the job's actual state lives in the store's lists. Finalizing or undoing
//! a claim takes the store explicitly; the handle holds no connection of
//! its own.

use crate::error::StoreError;
use crate::keys::QueueKey;
use crate::store::ListStore;

/// One claimed job: where it came from and its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    queue: QueueKey,
    message: String,
}

impl UnitOfWork {
    /// Creates a handle for a payload claimed from `queue`.
    pub fn new(queue: QueueKey, message: impl Into<String>) -> Self {
        Self {
            queue,
            message: message.into(),
        }
    }

    /// The queue this job was claimed from.
    pub fn queue(&self) -> &QueueKey {
        &self.queue
    }

    /// The raw serialized payload.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The queue's display name, namespace prefix stripped.
    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }

    /// Finalizes the claim: removes one occurrence of this payload from the
    /// working list.
    ///
    /// Succeeds even when a sweep already removed the entry: removing zero
    /// elements is not an error. With byte-identical payloads in flight the
    /// removed occurrence may be another claim's entry; the overall count
    /// still drops by at most one.
    pub async fn acknowledge<S: ListStore + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        // LREM is O(n); working lists are expected to stay small (bounded
        // by the number of concurrently claimed jobs)
        store
            .remove_one(self.queue.working_key(), &self.message)
            .await?;
        Ok(())
    }

    /// Undoes the claim: pushes the payload back onto the ready queue and
    /// removes one occurrence from the working list, as one all-or-nothing
    /// batch.
    pub async fn requeue<S: ListStore + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        store
            .push_then_remove(
                self.queue.ready_key(),
                &self.message,
                self.queue.working_key(),
            )
            .await
    }
}
