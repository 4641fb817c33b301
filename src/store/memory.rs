use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{KvStore, StoreError};

struct Entry {
    value: Bytes,
    expires_at: Instant,
}

/// Process-local [`KvStore`] with per-entry expiry.
///
/// Expired entries are dropped lazily when they are next read, or in bulk by
/// [`purge_expired`](Self::purge_expired).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rttp_cache::store::{KvStore, MemoryStore};
///
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// let store = MemoryStore::new();
/// store.set("cache:abc", "body".into(), Duration::from_secs(60)).await.unwrap();
/// assert_eq!(store.get("cache:abc").await.unwrap().as_deref(), Some(&b"body"[..]));
/// # });
/// ```
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including ones that have expired but not
    /// been purged yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `key` holds a live entry.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.entries
                .remove_if(key, |_, entry| entry.expires_at <= Instant::now());
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or(StoreError::TtlOutOfRange(ttl))?;
        let entry = Entry { value, expires_at };
        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }
}
