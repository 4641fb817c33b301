//! Middleware pipeline: composable before/after logic around a [`Handler`].
//!
//! Each middleware sees the request and the response sink before the
//! downstream handler does, and may:
//!
//! - **Pass through**: call `next.run(request, sink).await` unchanged.
//! - **Short-circuit**: write a response itself without calling `next`.
//! - **Observe**: call `next.run` with a wrapped sink and look at what the
//!   handler wrote. The response cache works this way.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining chain; [`Next::run`] advances it.
//! - [`Pipeline`]: an ordered middleware stack in front of a terminal handler.
//!   A pipeline is itself a [`Handler`], so it plugs straight into the server.
//! - [`LoggerMiddleware`]: built-in request/response logger.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::handler::Handler;
use crate::http::{Request, ResponseSink};

/// The core trait for all middleware.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; a single instance serves every
///   request concurrently.
/// - `next` may be run at most once. It is consumed by [`Next::run`].
/// - Whatever sink is handed to `next` must eventually forward to `sink`;
///   middleware must not swallow a response the client is waiting for.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: &Request, sink: &mut dyn ResponseSink, next: Next<'_>);
}

/// A cursor into the remaining middleware chain for a single request.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// Creates a cursor positioned at the start of `middlewares`, ending in
    /// `endpoint`.
    pub fn new(middlewares: &'a [Arc<dyn Middleware>], endpoint: &'a dyn Handler) -> Self {
        Self {
            middlewares,
            endpoint,
        }
    }

    /// Invokes the next middleware, or the endpoint once the stack is exhausted.
    pub async fn run(self, request: &Request, sink: &mut dyn ResponseSink) {
        match self.middlewares.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    middlewares: rest,
                    endpoint: self.endpoint,
                };
                current.handle(request, sink, next).await;
            }
            None => self.endpoint.serve(request, sink).await,
        }
    }
}

/// An ordered middleware stack in front of a terminal handler.
///
/// Middleware run in the order they were added: the first one added sees the
/// request first.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_cache::handler::from_fn;
/// use rttp_cache::http::{Response, StatusCode};
/// use rttp_cache::middleware::{LoggerMiddleware, Pipeline};
///
/// let app = Pipeline::new(from_fn(|_req| async { Response::new(StatusCode::OK) }))
///     .with(LoggerMiddleware);
/// ```
pub struct Pipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
    endpoint: Arc<dyn Handler>,
}

impl Pipeline {
    pub fn new(endpoint: impl Handler + 'static) -> Self {
        Self {
            middlewares: Vec::new(),
            endpoint: Arc::new(endpoint),
        }
    }

    /// Appends a middleware to the end of the stack (closest to the endpoint).
    #[must_use]
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }
}

#[async_trait]
impl Handler for Pipeline {
    async fn serve(&self, request: &Request, sink: &mut dyn ResponseSink) {
        Next::new(&self.middlewares, self.endpoint.as_ref())
            .run(request, sink)
            .await;
    }
}

/// Built-in middleware that logs each request's method, path, status, and
/// duration as a single `tracing::info!` line once the handler returns:
///
/// ```text
/// METHOD /path - STATUS (duration)
/// ```
pub struct LoggerMiddleware;

#[async_trait]
impl Middleware for LoggerMiddleware {
    async fn handle(&self, request: &Request, sink: &mut dyn ResponseSink, next: Next<'_>) {
        let start = Instant::now();

        next.run(request, sink).await;

        tracing::info!(
            "{} {} - {} ({:?})",
            request.method(),
            request.path(),
            sink.status().as_u16(),
            start.elapsed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;
    use crate::http::{BufferedSink, Method, Response, StatusCode};

    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, request: &Request, sink: &mut dyn ResponseSink, next: Next<'_>) {
            sink.headers_mut().insert("X-Order", self.0);
            next.run(request, sink).await;
        }
    }

    struct Deny;

    #[async_trait]
    impl Middleware for Deny {
        async fn handle(&self, _request: &Request, sink: &mut dyn ResponseSink, _next: Next<'_>) {
            sink.set_status(StatusCode::FORBIDDEN);
        }
    }

    fn ok_endpoint() -> impl Handler {
        from_fn(|_req| async { Response::new(StatusCode::OK).body("endpoint") })
    }

    #[tokio::test]
    async fn middleware_runs_in_insertion_order() {
        let app = Pipeline::new(ok_endpoint()).with(Tag("first")).with(Tag("second"));

        let mut sink = BufferedSink::new();
        app.serve(&Request::new(Method::Get, "/"), &mut sink).await;

        let order: Vec<_> = sink.headers().get_all("x-order").collect();
        assert_eq!(order, vec!["first", "second"]);
        assert_eq!(sink.body(), b"endpoint");
    }

    #[tokio::test]
    async fn short_circuit_skips_endpoint() {
        let app = Pipeline::new(ok_endpoint()).with(Deny);

        let mut sink = BufferedSink::new();
        app.serve(&Request::new(Method::Get, "/"), &mut sink).await;

        assert_eq!(sink.status(), StatusCode::FORBIDDEN);
        assert!(sink.body().is_empty());
    }

    #[tokio::test]
    async fn logger_is_transparent() {
        let app = Pipeline::new(ok_endpoint()).with(LoggerMiddleware);

        let mut sink = BufferedSink::new();
        app.serve(&Request::new(Method::Get, "/"), &mut sink).await;

        assert_eq!(sink.status(), StatusCode::OK);
        assert_eq!(sink.body(), b"endpoint");
    }
}
