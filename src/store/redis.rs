use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{KvStore, StoreError};
use crate::config::CacheConfig;

/// Redis-backed [`KvStore`].
///
/// Holds one multiplexed [`ConnectionManager`], shared by every request and
/// reconnecting on its own after a broken connection. The first connection is
/// made lazily on first use, so an unreachable Redis at startup only turns
/// lookups into misses instead of failing construction.
///
/// Values are stored with `PSETEX`, so TTLs keep millisecond precision.
pub struct RedisStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Creates a store for `addr`, either `host:port` or a `redis://` /
    /// `rediss://` URL. No connection is attempted yet.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] if the address cannot be parsed as a Redis URL.
    pub fn open(addr: &str) -> Result<Self, StoreError> {
        let url = if addr.contains("://") {
            addr.to_owned()
        } else {
            format!("redis://{addr}")
        };
        Ok(Self {
            client: redis::Client::open(url)?,
            connection: OnceCell::new(),
        })
    }

    /// Creates a store for the configured `redisAddr`.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn from_config(config: &CacheConfig) -> Result<Self, StoreError> {
        Self::open(&config.redis_addr)
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                debug!("opening redis connection");
                ConnectionManager::new(self.client.clone()).await
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        // Redis rejects expiries beyond i64 milliseconds.
        let millis = i64::try_from(ttl.as_millis())
            .map_err(|_| StoreError::TtlOutOfRange(ttl))?
            .max(1)
            .unsigned_abs();
        let mut conn = self.connection().await?;
        conn.pset_ex::<_, _, ()>(key, value.as_ref(), millis).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_port_is_accepted() {
        assert!(RedisStore::open("redis:6379").is_ok());
        assert!(RedisStore::open("127.0.0.1:6379").is_ok());
    }

    #[test]
    fn full_url_is_accepted() {
        assert!(RedisStore::open("redis://127.0.0.1:6379/0").is_ok());
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(
            RedisStore::open("memcache://127.0.0.1:11211"),
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn out_of_range_ttl_fails_before_connecting() {
        let store = RedisStore::open("127.0.0.1:1").unwrap();
        let err = store
            .set("k", Bytes::from_static(b"v"), Duration::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TtlOutOfRange(_)));
    }
}
