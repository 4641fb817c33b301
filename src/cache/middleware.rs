//! The cache-aside middleware.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

use super::capture::{CaptureSink, CapturedResponse};
use super::coalesce::{Flight, FlightGuard, InFlight};
use super::{CACHE_STATUS_HEADER, CacheKey, HIT};
use crate::config::{CacheConfig, ConfigError};
use crate::http::{Method, Request, ResponseSink, StatusCode};
use crate::middleware::{Middleware, Next};
use crate::store::{KvStore, RedisStore, StoreError};

/// Errors raised while building a [`CacheMiddleware`] from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot open cache store: {0}")]
    Store(#[from] StoreError),
}

/// Transparent GET response cache.
///
/// Per request:
///
/// 1. Anything but `GET` is passed straight through; the store is not touched.
/// 2. The [`CacheKey`] is looked up. A stored body is served as `200 OK` with
///    `X-Cache-Status: HIT` and the downstream handler is skipped.
/// 3. On a miss the handler runs behind a [`CaptureSink`], so the client
///    receives its response unchanged while a copy is recorded.
/// 4. A complete `2xx` capture is written back with the configured TTL.
///
/// Store trouble never reaches the client: failed or slow lookups count as
/// misses, failed writes are logged and dropped. Each store call is bounded by
/// the configured store timeout.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_cache::cache::CacheMiddleware;
/// use rttp_cache::config::CacheConfig;
/// use rttp_cache::handler::from_fn;
/// use rttp_cache::http::{Response, StatusCode};
/// use rttp_cache::middleware::Pipeline;
/// use rttp_cache::store::MemoryStore;
///
/// let cache = CacheMiddleware::new(Arc::new(MemoryStore::new()), &CacheConfig::default());
/// let app = Pipeline::new(from_fn(|_req| async { Response::new(StatusCode::OK).body("hi") }))
///     .with(cache);
/// ```
pub struct CacheMiddleware {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    store_timeout: Duration,
    max_body_bytes: usize,
    background_writes: bool,
    in_flight: Option<InFlight>,
}

impl CacheMiddleware {
    /// Builds the middleware around an already constructed store.
    ///
    /// `config` is read once; later changes to it have no effect.
    pub fn new(store: Arc<dyn KvStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            ttl: config.ttl_duration(),
            store_timeout: config.store_timeout(),
            max_body_bytes: config.max_body_bytes,
            background_writes: config.background_writes,
            in_flight: config.coalesce.then(InFlight::default),
        }
    }

    /// Validates `config` and builds the middleware on a [`RedisStore`] for
    /// `config.redis_addr`.
    ///
    /// # Errors
    ///
    /// [`BuildError::Config`] for an invalid configuration and
    /// [`BuildError::Store`] for an unusable Redis address.
    pub fn from_config(config: &CacheConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let store = RedisStore::from_config(config)?;
        Ok(Self::new(Arc::new(store), config))
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Bytes> {
        match bounded("lookup", self.store_timeout, self.store.get(key.as_str())).await {
            Ok(Some(body)) => {
                debug!(key = %key, bytes = body.len(), "cache hit");
                Some(body)
            }
            Ok(None) => {
                debug!(key = %key, "cache miss");
                None
            }
            Err(e) if e.is_timeout() => {
                warn!(
                    key = %key,
                    after = ?self.store_timeout,
                    "cache lookup timed out, forwarding"
                );
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache lookup failed, forwarding");
                None
            }
        }
    }

    async fn forward(
        &self,
        request: &Request,
        sink: &mut dyn ResponseSink,
        next: Next<'_>,
    ) -> CapturedResponse {
        let mut capture = CaptureSink::new(sink, self.max_body_bytes);
        next.run(request, &mut capture).await;
        capture.finish()
    }

    /// Writes `captured` back to the store unless it is unfit to be served
    /// later. `flight` is released once the write has finished.
    async fn persist(
        &self,
        key: CacheKey,
        captured: CapturedResponse,
        flight: Option<FlightGuard>,
    ) {
        if !captured.status().is_success() {
            debug!(key = %key, status = captured.status().as_u16(), "not caching non-2xx response");
            return;
        }
        if !captured.is_complete() {
            debug!(key = %key, "not caching incomplete or oversized body");
            return;
        }

        let store = Arc::clone(&self.store);
        let ttl = self.ttl;
        let timeout = self.store_timeout;
        let body = captured.into_body();
        let write = async move {
            let bytes = body.len();
            match bounded("write", timeout, store.set(key.as_str(), body, ttl)).await {
                Ok(()) => debug!(key = %key, bytes, ttl = ?ttl, "cached response"),
                Err(e) => warn!(key = %key, error = %e, "cache write failed"),
            }
            drop(flight);
        };

        if self.background_writes {
            tokio::spawn(write);
        } else {
            write.await;
        }
    }
}

#[async_trait]
impl Middleware for CacheMiddleware {
    async fn handle(&self, request: &Request, sink: &mut dyn ResponseSink, next: Next<'_>) {
        if request.method() != &Method::Get {
            next.run(request, sink).await;
            return;
        }

        let key = CacheKey::for_request(request);
        if let Some(body) = self.lookup(&key).await {
            serve_hit(sink, &body).await;
            return;
        }

        let mut flight = None;
        if let Some(in_flight) = &self.in_flight {
            match in_flight.join(&key) {
                Flight::Leader(guard) => flight = Some(guard),
                Flight::Follower(waiter) => {
                    debug!(key = %key, "waiting on in-flight request");
                    waiter.wait().await;
                    if let Some(body) = self.lookup(&key).await {
                        serve_hit(sink, &body).await;
                        return;
                    }
                }
            }
        }

        let captured = self.forward(request, sink, next).await;
        self.persist(key, captured, flight).await;
    }
}

async fn serve_hit(sink: &mut dyn ResponseSink, body: &[u8]) {
    sink.headers_mut().set(CACHE_STATUS_HEADER, HIT);
    sink.set_status(StatusCode::OK);
    if let Err(e) = sink.write(body).await {
        debug!(error = %e, "client went away while a cached body was being written");
    }
}

/// Runs a store call under `limit`, mapping expiry to [`StoreError::Timeout`].
async fn bounded<T>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout {
            operation,
            after: limit,
        })?
}
