//! Request tracing middleware.
//!
//! Opens one `http_request` span per request and logs the outcome when the
//! response is ready.

use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{info, info_span, Instrument, Span};

/// Tracing layer that creates spans for each request
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        let span = info_span!(
            "http_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            http.status_code = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(req).await;

                if let Ok(response) = &result {
                    let status = response.status().as_u16();
                    Span::current().record("http.status_code", status);
                    info!(
                        status,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Request completed"
                    );
                }

                result
            }
            .instrument(span),
        )
    }
}
