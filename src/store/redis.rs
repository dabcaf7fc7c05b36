//! Redis-backed store implementation.
//!
//! Claims map onto RPOPLPUSH/BRPOPLPUSH, which Redis guarantees to be
//! atomic, and the push+remove batches run as MULTI/EXEC pipelines so a
//! requeue either fully applies or fully fails.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::StoreError;

use super::{ListMove, ListStore};

/// Queue store backed by Redis.
///
/// The connection manager handles reconnection automatically and is cloned
/// per operation, so the store itself is cheaply cloneable and can be
/// shared across fetchers, recovery, and inspectors.
#[derive(Clone)]
pub struct RedisListStore {
    redis: ConnectionManager,
}

impl RedisListStore {
    /// Connects to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectionFailed` if the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Ok(Self { redis })
    }

    /// Creates a store from an existing connection manager.
    ///
    /// Useful when sharing a connection across multiple components.
    pub fn from_connection(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl ListStore for RedisListStore {
    async fn move_tail_to_head(
        &self,
        src: &str,
        dst: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = redis::cmd("RPOPLPUSH")
            .arg(src)
            .arg(dst)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn blocking_move_tail_to_head(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.clone();
        // BRPOPLPUSH takes whole seconds; 0 would block forever
        let timeout_secs = timeout.as_secs().max(1) as usize;

        let value: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(src)
            .arg(dst)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn range(
        &self,
        list: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.redis.clone();
        let entries: Vec<String> = conn.lrange(list, start, stop).await?;
        Ok(entries)
    }

    async fn len(&self, list: &str) -> Result<usize, StoreError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(list).await?;
        Ok(len)
    }

    async fn push(&self, list: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        conn.rpush::<_, _, ()>(list, value).await?;
        Ok(())
    }

    async fn remove_one(&self, list: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.redis.clone();
        let removed: usize = conn.lrem(list, 1, value).await?;
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.redis.clone();
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    async fn push_then_remove(
        &self,
        push_to: &str,
        value: &str,
        remove_from: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().rpush(push_to, value).lrem(remove_from, 1, value);
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn push_then_remove_many(&self, moves: &[ListMove]) -> Result<(), StoreError> {
        if moves.is_empty() {
            return Ok(());
        }

        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for mv in moves {
            pipe.rpush(&mv.push_to, &mv.value)
                .lrem(&mv.remove_from, 1, &mv.value);
        }
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}
