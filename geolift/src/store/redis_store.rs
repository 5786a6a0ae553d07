//! Redis-backed store.

use super::{SharedStore, StoreError};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

/// Production [`SharedStore`] on top of Redis.
///
/// Uses a managed connection that transparently reconnects. Cloning
/// shares the underlying connection and is the intended way to hand the
/// store to multiple components.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connects to the given Redis URL and verifies liveness.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        debug!(url, "connected to redis");
        let store = Self { manager };
        store.ping().await?;
        Ok(store)
    }

    fn map_err(e: redis::RedisError) -> StoreError {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.manager.clone();
        con.get(key).await.map_err(Self::map_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        con.set(key, value).await.map_err(Self::map_err)
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut con = self.manager.clone();
        con.set_nx(key, value).await.map_err(Self::map_err)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.manager.clone();
        let removed: i64 = con.del(key).await.map_err(Self::map_err)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.manager.clone();
        con.exists(key).await.map_err(Self::map_err)
    }

    async fn append(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }
        let mut con = self.manager.clone();
        con.rpush::<_, _, ()>(key, values)
            .await
            .map_err(Self::map_err)
    }

    async fn list(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.manager.clone();
        con.lrange(key, 0, -1).await.map_err(Self::map_err)
    }

    async fn map_set(&self, key: &str, entries: &[(String, String)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut con = self.manager.clone();
        con.hset_multiple::<_, _, _, ()>(key, entries)
            .await
            .map_err(Self::map_err)
    }

    async fn map_get_all(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut con = self.manager.clone();
        con.hgetall(key).await.map_err(Self::map_err)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.manager.clone();
        let pattern = format!("{prefix}*");
        let mut iter = con
            .scan_match::<_, String>(pattern)
            .await
            .map_err(Self::map_err)?;
        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        redis::cmd("PING")
            .query_async::<()>(&mut con)
            .await
            .map_err(Self::map_err)
    }
}
