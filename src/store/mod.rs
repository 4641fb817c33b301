//! Key-value store adapters: where cached bodies live.
//!
//! The cache talks to its backing store through the minimal [`KvStore`]
//! trait: a lookup and a write with a time-to-live. The store owns
//! persistence and expiry; there is no delete.
//!
//! Two implementations ship with the crate:
//!
//! - [`RedisStore`]: the shared, networked store used in production.
//! - [`MemoryStore`]: a process-local map with per-entry expiry, for tests
//!   and single-node development.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors a store call can fail with.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] ::redis::RedisError),

    #[error("store {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("ttl {0:?} is out of range for this store")]
    TtlOutOfRange(Duration),
}

impl StoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A networked (or local) key-value store with TTL-bounded writes.
///
/// # Contract
///
/// - `get` returns `Ok(None)` for absent *and* expired keys.
/// - `set` overwrites any existing value and resets its TTL.
/// - Implementations are shared by every in-flight request and must be safe
///   for concurrent use.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_report_as_timeouts() {
        let timeout = StoreError::Timeout {
            operation: "lookup",
            after: Duration::from_millis(250),
        };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.to_string(), "store lookup timed out after 250ms");
        assert!(!StoreError::Unavailable("down".into()).is_timeout());
        assert!(!StoreError::TtlOutOfRange(Duration::MAX).is_timeout());
    }
}
