//! Redis cache tier with pooled connections.
//!
//! Enabled with the `redis` feature. Values are stored with `SET EX`, so
//! expiry is enforced server-side and shared across processes.

use std::time::Duration;

use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};

use concierge_core::StateError;

use crate::cache::CacheTier;

/// Cache tier backed by a Redis server.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    /// Connect to the given Redis URL (e.g. `redis://127.0.0.1/`).
    pub fn connect(url: &str) -> Result<Self, StateError> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StateError::cache(format!("pool creation failed: {e}")))?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, StateError> {
        self.pool
            .get()
            .await
            .map_err(|e| StateError::cache(format!("connection checkout failed: {e}")))
    }
}

#[async_trait::async_trait]
impl CacheTier for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| StateError::cache(format!("GET {key} failed: {e}")))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StateError> {
        let mut conn = self.conn().await?;
        // SET EX requires a whole number of seconds; round sub-second TTLs up.
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| StateError::cache(format!("SET {key} failed: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| StateError::cache(format!("DEL {key} failed: {e}")))
    }
}
