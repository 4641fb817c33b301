//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches HTTP/1.1 requests to a [`Handler`].
//! Each connection runs on its own task; responses stream back through a
//! [`StreamSink`] as the handler writes them. Persistent connections
//! (keep-alive) and pipelined requests are supported.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::handler::Handler;
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

mod stream;

pub use stream::StreamSink;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_cache::handler::from_fn;
/// use rttp_cache::http::{Response, StatusCode};
/// use rttp_cache::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server
///         .run(from_fn(|_req| async { Response::new(StatusCode::OK).body("Hello!") }))
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and dispatching requests to `handler`.
    ///
    /// Runs until the process is terminated. Accept errors are logged and the
    /// loop continues.
    ///
    /// # Errors
    ///
    /// Currently never returns an error; the `Result` leaves room for
    /// listener-level failures.
    pub async fn run(self, handler: impl Handler + 'static) -> Result<(), ServerError> {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        info!(address = %self.local_addr, "rttp-cache listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// Buffered bytes are parsed before reading more, so pipelined requests that
/// arrived in one segment are served back to back.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<dyn Handler>,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        match Request::parse(&buf) {
            Ok((request, body_offset)) => {
                let declared = request.content_length().unwrap_or(0);
                let total_needed = match body_offset.checked_add(declared) {
                    Some(total) if total <= MAX_REQUEST_SIZE => total,
                    _ => {
                        warn!(peer = %peer_addr, declared, "declared body too large, sending 413");
                        reject(
                            &mut stream,
                            StatusCode::PAYLOAD_TOO_LARGE,
                            "Request entity too large",
                        )
                        .await?;
                        break;
                    }
                };
                if buf.len() >= total_needed {
                    let consumed = buf.split_to(total_needed);
                    let request =
                        request.with_body(Bytes::copy_from_slice(&consumed[body_offset..]));

                    debug!(
                        peer = %peer_addr,
                        method = %request.method(),
                        uri = %request.uri(),
                        "dispatching request"
                    );

                    let mut sink = StreamSink::new(&mut stream, &request);
                    handler.serve(&request, &mut sink).await;
                    if !sink.finish().await? {
                        debug!(peer = %peer_addr, "Connection: close, shutting down");
                        break;
                    }
                    continue;
                }
            }
            Err(RequestError::Incomplete) => {}
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                reject(&mut stream, StatusCode::BAD_REQUEST, format!("Bad Request: {e}")).await?;
                break;
            }
        }

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large, sending 413");
            reject(&mut stream, StatusCode::PAYLOAD_TOO_LARGE, "Request entity too large").await?;
            break;
        }

        if stream.read_buf(&mut buf).await? == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }
    }

    Ok(())
}

/// Writes a final error response; the caller closes the connection.
async fn reject(
    stream: &mut TcpStream,
    status: StatusCode,
    body: impl Into<String>,
) -> Result<(), std::io::Error> {
    let response = Response::new(status).body(body).keep_alive(false);
    stream.write_all(&response.into_bytes()).await
}
