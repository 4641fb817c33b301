//! Cache configuration.
//!
//! Loaded once when the middleware is built and never changed afterwards.
//! The JSON form uses camelCase keys; every key is optional:
//!
//! ```json
//! { "redisAddr": "redis:6379", "ttl": 60 }
//! ```

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default store endpoint: Redis on its standard local port.
pub const DEFAULT_REDIS_ADDR: &str = "127.0.0.1:6379";

/// Default entry lifetime, in seconds.
pub const DEFAULT_TTL_SECS: u64 = 60;

/// Longest accepted entry lifetime (one year), in seconds.
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Default bound on a single store round trip, in milliseconds.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 250;

/// Default cap on a cacheable body (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Errors raised while loading or validating a [`CacheConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid cache configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid cache configuration: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Options recognised by the cache middleware.
///
/// # Examples
///
/// ```
/// use rttp_cache::config::CacheConfig;
///
/// let config = CacheConfig::from_json(r#"{ "redisAddr": "redis:6379", "ttl": 30 }"#).unwrap();
/// assert_eq!(config.redis_addr, "redis:6379");
/// assert_eq!(config.ttl_duration().as_secs(), 30);
/// assert!(config.background_writes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Store endpoint, `host:port` or a full `redis://` URL.
    pub redis_addr: String,
    /// Entry lifetime in seconds.
    pub ttl: u64,
    /// Upper bound on each store lookup and write, in milliseconds.
    pub store_timeout_ms: u64,
    /// Bodies larger than this are served but not stored.
    pub max_body_bytes: usize,
    /// Collapse concurrent misses for the same key into one forward.
    pub coalesce: bool,
    /// Write to the store on a spawned task instead of inline.
    pub background_writes: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_addr: DEFAULT_REDIS_ADDR.to_owned(),
            ttl: DEFAULT_TTL_SECS,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            coalesce: false,
            background_writes: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed JSON or mistyped values, and
    /// [`ConfigError::Invalid`] when [`validate`](Self::validate) rejects it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the middleware relies on.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_addr.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "redisAddr",
                reason: "must not be empty",
            });
        }
        if self.ttl == 0 {
            return Err(ConfigError::Invalid {
                field: "ttl",
                reason: "must be at least one second",
            });
        }
        if self.ttl > MAX_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "ttl",
                reason: "must not exceed one year",
            });
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "storeTimeoutMs",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn with_redis_addr(mut self, addr: impl Into<String>) -> Self {
        self.redis_addr = addr.into();
        self
    }

    /// Sets the entry lifetime. Sub-second remainders round up to the next
    /// whole second.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl
            .as_secs()
            .saturating_add(u64::from(ttl.subsec_nanos() > 0));
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    #[must_use]
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalesce = enabled;
        self
    }

    #[must_use]
    pub fn with_background_writes(mut self, enabled: bool) -> Self {
        self.background_writes = enabled;
        self
    }

    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
