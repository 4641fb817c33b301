//! Socket-backed [`ResponseSink`].
//!
//! The response head is buffered until the first body byte (or
//! [`StreamSink::finish`]) and then written once. Body framing depends on the
//! peer:
//!
//! | Situation                        | Framing                                   |
//! |----------------------------------|-------------------------------------------|
//! | no body written                  | `Content-Length: 0`                       |
//! | handler set `Content-Length`     | raw bytes, connection kept alive          |
//! | HTTP/1.1                         | `Transfer-Encoding: chunked`              |
//! | HTTP/1.0                         | raw bytes, connection closed afterwards   |
//! | `HEAD` request                   | head only, body bytes are dropped         |

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::{Headers, Method, Request, ResponseSink, StatusCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Chunked,
    CloseDelimited,
    /// The handler declared `Content-Length`; the body goes out as-is.
    Identity,
}

/// Streams a response straight onto a connection.
pub struct StreamSink<'a, W> {
    writer: &'a mut W,
    status: StatusCode,
    headers: Headers,
    framing: Framing,
    head_only: bool,
    keep_alive: bool,
    committed: bool,
}

impl<'a, W> StreamSink<'a, W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Prepares a sink answering `request` on `writer`.
    pub fn new(writer: &'a mut W, request: &Request) -> Self {
        let framing = if request.version() >= 1 {
            Framing::Chunked
        } else {
            Framing::CloseDelimited
        };
        Self {
            writer,
            status: StatusCode::OK,
            headers: Headers::new(),
            framing,
            head_only: request.method() == &Method::Head,
            keep_alive: request.is_keep_alive(),
            committed: false,
        }
    }

    /// Returns `true` if the connection may carry another request after this
    /// response is finished.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Completes the response: writes the head if nothing was written yet, and
    /// the terminating chunk for chunked bodies.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the peer is gone.
    pub async fn finish(mut self) -> io::Result<bool> {
        if !self.committed {
            self.headers.set("Content-Length", "0");
            self.write_head().await?;
        } else if self.framing == Framing::Chunked && !self.head_only {
            self.writer.write_all(b"0\r\n\r\n").await?;
        }
        self.writer.flush().await?;
        Ok(self.keep_alive)
    }

    async fn write_head(&mut self) -> io::Result<()> {
        self.committed = true;
        if self.headers.contains("content-length") {
            self.framing = Framing::Identity;
        } else {
            match self.framing {
                Framing::Chunked => self.headers.set("Transfer-Encoding", "chunked"),
                Framing::CloseDelimited => self.keep_alive = false,
                Framing::Identity => {}
            }
        }
        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.set("Connection", connection);

        let head = format!("HTTP/1.1 {}\r\n{}\r\n", self.status, self.headers);
        self.writer.write_all(head.as_bytes()).await
    }
}

#[async_trait]
impl<'a, W> ResponseSink for StreamSink<'a, W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        if !self.committed {
            self.status = status;
        }
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    async fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        if !self.committed {
            self.write_head().await?;
        }
        if chunk.is_empty() || self.head_only {
            return Ok(chunk.len());
        }
        match self.framing {
            Framing::Chunked => {
                let size = format!("{:X}\r\n", chunk.len());
                self.writer.write_all(size.as_bytes()).await?;
                self.writer.write_all(chunk).await?;
                self.writer.write_all(b"\r\n").await?;
            }
            Framing::CloseDelimited | Framing::Identity => self.writer.write_all(chunk).await?,
        }
        Ok(chunk.len())
    }
}
