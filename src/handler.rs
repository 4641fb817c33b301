//! Downstream handlers: the thing a request is ultimately forwarded to.
//!
//! A [`Handler`] receives the request and writes its reply into a
//! [`ResponseSink`]. Writing rather than returning is what allows a wrapper
//! such as the cache to sit in the response path as a pure observer.
//!
//! Handlers that prefer to build a whole [`Response`] up front can be adapted
//! with [`from_fn`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::http::{Request, Response, ResponseSink};

/// Serves one request by writing a status, headers, and body into `sink`.
///
/// # Contract
///
/// - `serve` is called once per forwarded request.
/// - Implementations own their error responses: there is no error return, a
///   failing handler writes e.g. a `500` into the sink itself.
/// - Implementations are shared across Tokio tasks and must be `Send + Sync`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn serve(&self, request: &Request, sink: &mut dyn ResponseSink);
}

#[async_trait]
impl<H> Handler for Arc<H>
where
    H: Handler + ?Sized,
{
    async fn serve(&self, request: &Request, sink: &mut dyn ResponseSink) {
        (**self).serve(request, sink).await;
    }
}

/// A [`Handler`] backed by an `async` closure that returns a [`Response`].
///
/// Created by [`from_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Adapts `Fn(Request) -> impl Future<Output = Response>` into a [`Handler`].
///
/// The returned response is replayed into the sink as one body chunk.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_cache::handler::from_fn;
/// use rttp_cache::http::{Request, Response, StatusCode};
///
/// let origin = from_fn(|req: Request| async move {
///     Response::new(StatusCode::OK).body(format!("you asked for {}", req.path()))
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn serve(&self, request: &Request, sink: &mut dyn ResponseSink) {
        let response = (self.f)(request.clone()).await;
        if let Err(e) = response.send(sink).await {
            debug!(error = %e, "client went away while the response was being written");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{BufferedSink, Method, StatusCode};

    #[tokio::test]
    async fn fn_handler_writes_its_response() {
        let handler = from_fn(|req: Request| async move {
            Response::new(StatusCode::CREATED).body(req.path().to_owned())
        });

        let mut sink = BufferedSink::new();
        handler
            .serve(&Request::new(Method::Post, "/widgets"), &mut sink)
            .await;

        assert_eq!(sink.status(), StatusCode::CREATED);
        assert_eq!(sink.body(), b"/widgets");
    }

    #[tokio::test]
    async fn shared_handler_serves_through_arc() {
        let handler: Arc<dyn Handler> =
            Arc::new(from_fn(|_req| async { Response::new(StatusCode::OK).body("ok") }));

        let mut sink = BufferedSink::new();
        handler.serve(&Request::new(Method::Get, "/"), &mut sink).await;
        assert_eq!(sink.body(), b"ok");
    }
}
