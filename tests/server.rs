use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rttp_cache::cache::CacheMiddleware;
use rttp_cache::config::CacheConfig;
use rttp_cache::handler::from_fn;
use rttp_cache::http::{Request, Response, StatusCode};
use rttp_cache::middleware::{LoggerMiddleware, Pipeline};
use rttp_cache::server::Server;
use rttp_cache::store::MemoryStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn spawn_cached_origin(calls: Arc<AtomicUsize>) -> SocketAddr {
    let origin = from_fn(move |req: Request| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            match req.path() {
                "/widgets/7" => Response::new(StatusCode::OK)
                    .header("Content-Type", "application/json")
                    .body(r#"{"id":7}"#),
                "/sized" => Response::new(StatusCode::OK)
                    .header("Content-Length", "5")
                    .body("hello"),
                _ => Response::new(StatusCode::NOT_FOUND),
            }
        }
    });
    let config = CacheConfig::new().with_background_writes(false);
    let app = Pipeline::new(origin)
        .with(LoggerMiddleware)
        .with(CacheMiddleware::new(Arc::new(MemoryStore::new()), &config));

    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.run(app));
    addr
}

async fn exchange(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

const GET_WIDGET: &str = "GET /widgets/7 HTTP/1.1\r\nHost: origin\r\nConnection: close\r\n\r\n";

#[tokio::test]
async fn second_request_over_the_wire_is_a_hit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = spawn_cached_origin(calls.clone()).await;

    let miss = exchange(addr, GET_WIDGET).await;
    assert!(miss.starts_with("HTTP/1.1 200 OK\r\n"), "{miss}");
    assert!(miss.contains("Content-Type: application/json\r\n"));
    assert!(miss.contains("Transfer-Encoding: chunked\r\n"));
    assert!(miss.contains(r#"{"id":7}"#));
    assert!(!miss.contains("X-Cache-Status"));

    let hit = exchange(addr, GET_WIDGET).await;
    assert!(hit.starts_with("HTTP/1.1 200 OK\r\n"), "{hit}");
    assert!(hit.contains("X-Cache-Status: HIT\r\n"));
    assert!(hit.contains(r#"{"id":7}"#));
    assert!(hit.ends_with("0\r\n\r\n"));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_response_is_content_length_framed() {
    let addr = spawn_cached_origin(Arc::new(AtomicUsize::new(0))).await;

    let reply = exchange(
        addr,
        "GET /nowhere HTTP/1.1\r\nHost: origin\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 404 Not Found\r\n"), "{reply}");
    assert!(reply.contains("Content-Length: 0\r\n"));
    assert!(reply.ends_with("\r\n\r\n"));
}

#[tokio::test]
async fn pipelined_requests_share_a_connection() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = spawn_cached_origin(calls.clone()).await;

    let reply = exchange(
        addr,
        "GET /widgets/7 HTTP/1.1\r\nHost: origin\r\n\r\n\
         GET /widgets/7 HTTP/1.1\r\nHost: origin\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert_eq!(reply.matches("HTTP/1.1 200 OK\r\n").count(), 2, "{reply}");
    assert_eq!(reply.matches("X-Cache-Status: HIT\r\n").count(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn declared_content_length_survives_a_pipelined_connection() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = spawn_cached_origin(calls.clone()).await;

    let reply = exchange(
        addr,
        "GET /sized HTTP/1.1\r\nHost: origin\r\n\r\n\
         GET /sized HTTP/1.1\r\nHost: origin\r\nConnection: close\r\n\r\n",
    )
    .await;

    let (miss, hit) = reply
        .split_once("HTTP/1.1 200 OK\r\n")
        .and_then(|(_, rest)| rest.split_once("HTTP/1.1 200 OK\r\n"))
        .expect("two responses on the wire");
    assert!(
        miss.ends_with("Content-Length: 5\r\nConnection: keep-alive\r\n\r\nhello"),
        "{miss}"
    );
    assert!(!miss.contains("Transfer-Encoding"));
    assert!(hit.contains("X-Cache-Status: HIT\r\n"));
    assert!(hit.ends_with("5\r\nhello\r\n0\r\n\r\n"), "{hit}");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_request_gets_400() {
    let addr = spawn_cached_origin(Arc::new(AtomicUsize::new(0))).await;
    let reply = exchange(addr, "NOT AN HTTP REQUEST\r\n\r\n").await;
    assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{reply}");
}

#[tokio::test]
async fn oversized_declared_body_gets_413() {
    let addr = spawn_cached_origin(Arc::new(AtomicUsize::new(0))).await;
    let reply = exchange(
        addr,
        "POST /upload HTTP/1.1\r\nHost: origin\r\nContent-Length: 18446744073709551615\r\n\r\n",
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{reply}");
}
