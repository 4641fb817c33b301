//! # rttp-cache
//!
//! Transparent GET response caching for the rttp HTTP/1.1 server, backed by a
//! shared key-value store such as Redis.
//!
//! The cache sits in the request path as middleware. A `GET` whose response
//! is already stored is answered directly with `X-Cache-Status: HIT`; any
//! other `GET` is forwarded to the downstream handler, whose response streams
//! to the client unchanged while a copy is recorded and written back with a
//! TTL. Every other method passes straight through.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rttp_cache::cache::CacheMiddleware;
//! use rttp_cache::config::CacheConfig;
//! use rttp_cache::handler::from_fn;
//! use rttp_cache::http::{Response, StatusCode};
//! use rttp_cache::middleware::Pipeline;
//! use rttp_cache::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CacheConfig::from_json(r#"{ "redisAddr": "127.0.0.1:6379", "ttl": 60 }"#)?;
//!     let origin = from_fn(|_req| async {
//!         Response::new(StatusCode::OK).body("expensive answer")
//!     });
//!     let app = Pipeline::new(origin).with(CacheMiddleware::from_config(&config)?);
//!
//!     Server::bind("127.0.0.1:8080").await?.run(app).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod server;
pub mod store;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheKey, CacheMiddleware};
pub use config::CacheConfig;
pub use handler::{Handler, from_fn};
pub use http::{Headers, Method, Request, Response, ResponseSink, StatusCode};
pub use server::{Server, ServerError};
pub use store::{KvStore, MemoryStore, RedisStore, StoreError};
