//! Response capture: a tee in front of the real sink.

use std::io;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use crate::http::{Headers, ResponseSink, StatusCode};

/// What the downstream handler produced during one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    status: StatusCode,
    body: Bytes,
    complete: bool,
}

impl CapturedResponse {
    /// The last status the handler set, `200 OK` if it never set one.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Body bytes delivered to the client, in order.
    ///
    /// Empty when the capture is not [complete](Self::is_complete).
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// `false` if the body outgrew the capture limit or a write to the client
    /// failed; such a capture must not be persisted.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// A [`ResponseSink`] that forwards everything to the client's sink and keeps
/// a copy of the status and body.
///
/// The client sees exactly what it would see without the capture: every call
/// is forwarded unmodified and its result returned as-is.
///
/// Only bytes the inner sink accepted are recorded. Once the recorded body
/// would pass `limit`, or a forward fails, recording stops and the buffer is
/// released; forwarding continues either way.
pub struct CaptureSink<'a> {
    inner: &'a mut dyn ResponseSink,
    status: StatusCode,
    body: BytesMut,
    limit: usize,
    complete: bool,
}

impl<'a> CaptureSink<'a> {
    pub fn new(inner: &'a mut dyn ResponseSink, limit: usize) -> Self {
        Self {
            inner,
            status: StatusCode::OK,
            body: BytesMut::new(),
            limit,
            complete: true,
        }
    }

    /// Ends the capture and hands back what was recorded.
    pub fn finish(self) -> CapturedResponse {
        CapturedResponse {
            status: self.status,
            body: self.body.freeze(),
            complete: self.complete,
        }
    }

    fn abandon(&mut self) {
        self.complete = false;
        self.body = BytesMut::new();
    }
}

#[async_trait]
impl<'a> ResponseSink for CaptureSink<'a> {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.inner.set_status(status);
    }

    fn headers_mut(&mut self) -> &mut Headers {
        self.inner.headers_mut()
    }

    async fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(chunk).await;
        if self.complete {
            match &result {
                Ok(written) if self.body.len() + written <= self.limit => {
                    self.body.extend_from_slice(&chunk[..*written]);
                }
                _ => self.abandon(),
            }
        }
        result
    }
}
