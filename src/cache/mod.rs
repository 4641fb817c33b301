//! Caching layer: transparent GET response caching over an external store.
//!
//! ## Components
//!
//! - [`CacheKey`]: deterministic key derivation from method and request target.
//! - [`CaptureSink`] / [`CapturedResponse`]: records what the downstream
//!   handler writes while passing it through to the client untouched.
//! - [`CacheMiddleware`]: the cache-aside protocol: look up, serve on hit,
//!   forward and capture on miss, write back with a TTL.
//!
//! ## Known limitations
//!
//! - Only the body is stored. Hits are replayed as `200 OK` with no
//!   downstream headers.
//! - URIs are keyed byte-for-byte; reordered query parameters miss each other.
//! - Without coalescing, concurrent misses for one key each forward and each
//!   write (last write wins).

mod capture;
mod coalesce;
mod key;
mod middleware;

pub use capture::{CaptureSink, CapturedResponse};
pub use key::{CacheKey, NAMESPACE};
pub use middleware::{BuildError, CacheMiddleware};

/// Response header set on cache hits.
pub const CACHE_STATUS_HEADER: &str = "X-Cache-Status";

/// Value of [`CACHE_STATUS_HEADER`] on a hit.
pub const HIT: &str = "HIT";
