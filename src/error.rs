//! Error types for store access and job fetching.

use thiserror::Error;

/// Errors that can occur while talking to the queue store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to establish a connection to the store.
    #[error("store connection failed: {0}")]
    ConnectionFailed(String),

    /// A store operation failed after the connection was established.
    #[error("store operation failed: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Errors that can occur while fetching work.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetcher was configured without any queues.
    #[error("no queues configured")]
    NoQueues,

    /// The underlying store failed during a claim.
    #[error(transparent)]
    Store(#[from] StoreError),
}
