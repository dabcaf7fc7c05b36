//! The queue-store seam.
//!
//! Everything the fetching core needs from the shared store is captured by
//! the [`ListStore`] trait: atomic single-element moves between lists
//! (blocking and non-blocking), range reads, pushes, remove-one-by-value,
//! key-pattern listing, and an all-or-nothing push+remove batch.
//!
//! Two implementations are provided:
//!
//! - [`RedisListStore`]: the production backend, over a
//!   `redis::aio::ConnectionManager`
//! - [`MemoryListStore`]: an in-process backend for tests and local
//!   development
//!
//! Correctness of the claim step rests entirely on `move_tail_to_head`
//! being a single indivisible operation at the store; no client-side
//! locking is layered on top.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use self::memory::MemoryListStore;
pub use self::redis::RedisListStore;

/// One push+remove pair inside a batched requeue: push `value` onto
/// `push_to`, then remove one occurrence of it from `remove_from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMove {
    /// List the value is appended to.
    pub push_to: String,
    /// List one matching occurrence is removed from.
    pub remove_from: String,
    /// The raw payload being moved.
    pub value: String,
}

/// Atomic list operations over a shared queue store.
///
/// All lists are ordered head-to-tail; producers append at the tail and
/// consumers claim from the tail of ready queues into the head of working
/// lists.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Atomically removes the tail element of `src` and pushes it as the
    /// head of `dst`. Returns `None` if `src` is empty.
    async fn move_tail_to_head(&self, src: &str, dst: &str)
        -> Result<Option<String>, StoreError>;

    /// Like [`ListStore::move_tail_to_head`], but blocks up to `timeout`
    /// waiting for an element to appear in `src`.
    async fn blocking_move_tail_to_head(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError>;

    /// Returns the elements of `list` in the inclusive index range
    /// `start..=stop` without mutating it. Negative indices count from the
    /// tail, `-1` being the last element.
    async fn range(&self, list: &str, start: isize, stop: isize)
        -> Result<Vec<String>, StoreError>;

    /// Current element count of `list`. Missing lists have length zero.
    async fn len(&self, list: &str) -> Result<usize, StoreError>;

    /// Appends `value` to the tail of `list`.
    async fn push(&self, list: &str, value: &str) -> Result<(), StoreError>;

    /// Removes the first occurrence of `value` from `list`, scanning from
    /// the head. Returns the number of elements removed (0 or 1); removing
    /// from a list that no longer contains the value is not an error.
    async fn remove_one(&self, list: &str, value: &str) -> Result<usize, StoreError>;

    /// Lists all keys matching a glob `pattern`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Executes one push+remove pair as a single all-or-nothing unit.
    async fn push_then_remove(
        &self,
        push_to: &str,
        value: &str,
        remove_from: &str,
    ) -> Result<(), StoreError>;

    /// Executes a batch of push+remove pairs as a single all-or-nothing
    /// request. An empty batch is a no-op.
    async fn push_then_remove_many(&self, moves: &[ListMove]) -> Result<(), StoreError>;
}
