//! Streaming response output.
//!
//! Handlers do not return a finished response; they write one into a
//! [`ResponseSink`], status and headers first, then zero or more body chunks.
//! This is what lets a wrapper observe a response while it is being sent
//! instead of after the fact.
//!
//! - [`ResponseSink`]: the trait every output implements.
//! - [`BufferedSink`]: collects everything into a [`Response`] in memory.
//!
//! The server's socket-backed sink lives in [`crate::server`].

use std::io;

use async_trait::async_trait;
use bytes::BytesMut;

use super::{Headers, Response, StatusCode};

/// The write side of a single HTTP response.
///
/// # Contract
///
/// - The status defaults to `200 OK` until [`set_status`](Self::set_status) is
///   called.
/// - Status and headers may be changed freely until the first body byte is
///   written. Implementations that stream to a socket commit the head at that
///   point and ignore later changes.
/// - [`write`](Self::write) delivers bytes in call order and reports the
///   number of bytes accepted, like [`std::io::Write::write`].
#[async_trait]
pub trait ResponseSink: Send {
    /// Returns the status recorded so far.
    fn status(&self) -> StatusCode;

    fn set_status(&mut self, status: StatusCode);

    fn headers_mut(&mut self) -> &mut Headers;

    /// Writes one body chunk.
    async fn write(&mut self, chunk: &[u8]) -> io::Result<usize>;
}

/// An in-memory [`ResponseSink`].
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{BufferedSink, ResponseSink, StatusCode};
///
/// # tokio_test_block(async {
/// let mut sink = BufferedSink::new();
/// sink.set_status(StatusCode::NOT_FOUND);
/// sink.write(b"missing").await.unwrap();
///
/// let response = sink.into_response();
/// assert_eq!(response.status(), StatusCode::NOT_FOUND);
/// assert_eq!(response.body_ref().as_ref(), b"missing");
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Default)]
pub struct BufferedSink {
    status: StatusCode,
    headers: Headers,
    body: BytesMut,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the body bytes written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Freezes everything written into a [`Response`].
    pub fn into_response(self) -> Response {
        let mut response = Response::new(self.status).body_bytes(self.body.freeze());
        for (name, value) in self.headers.iter() {
            response = response.header(name, value);
        }
        response
    }
}

#[async_trait]
impl ResponseSink for BufferedSink {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    async fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(chunk);
        Ok(chunk.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunks_accumulate_in_order() {
        let mut sink = BufferedSink::new();
        assert_eq!(sink.write(b"{\"id\":").await.unwrap(), 6);
        assert_eq!(sink.write(b"7}").await.unwrap(), 2);
        assert_eq!(sink.body(), b"{\"id\":7}");
        assert_eq!(sink.status(), StatusCode::OK);
    }

    #[test]
    fn headers_survive_into_response() {
        let mut sink = BufferedSink::new();
        sink.headers_mut().insert("Content-Type", "application/json");
        let response = sink.into_response();
        assert_eq!(response.headers().get("content-type"), Some("application/json"));
        assert!(response.body_ref().is_empty());
    }
}
