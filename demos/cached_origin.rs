//! A slow origin behind the response cache.
//!
//! ```text
//! cargo run --example cached_origin -- [config.json]
//! curl -i http://127.0.0.1:8080/reports/42       # ~500 ms, no X-Cache-Status
//! curl -i http://127.0.0.1:8080/reports/42       # instant, X-Cache-Status: HIT
//! ```
//!
//! Without a config file the defaults are used (`127.0.0.1:6379`, 60 s TTL).
//! Set `CACHE_STORE=memory` to run without Redis.

use std::sync::Arc;
use std::time::Duration;

use rttp_cache::cache::CacheMiddleware;
use rttp_cache::config::CacheConfig;
use rttp_cache::handler::from_fn;
use rttp_cache::http::{Request, Response, StatusCode};
use rttp_cache::middleware::{LoggerMiddleware, Pipeline};
use rttp_cache::server::Server;
use rttp_cache::store::MemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rttp_cache=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match std::env::args().nth(1) {
        Some(path) => CacheConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => CacheConfig::default(),
    };

    let cache = if std::env::var("CACHE_STORE").as_deref() == Ok("memory") {
        CacheMiddleware::new(Arc::new(MemoryStore::new()), &config)
    } else {
        CacheMiddleware::from_config(&config)?
    };

    let origin = from_fn(|req: Request| async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        match req.path().strip_prefix("/reports/") {
            Some(id) if !id.is_empty() => Response::new(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(format!(r#"{{"report":"{id}","rows":1024}}"#)),
            _ => Response::new(StatusCode::NOT_FOUND).body("Not Found"),
        }
    });

    let app = Pipeline::new(origin).with(LoggerMiddleware).with(cache);

    Server::bind("127.0.0.1:8080").await?.run(app).await?;
    Ok(())
}
