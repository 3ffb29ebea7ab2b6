//! HTTP tracing middleware
//!
//! Opens a root span per HTTP request, continuing a W3C `traceparent` when
//! the caller sent one. The span context is stored in the request extensions
//! so the chat relay, which runs on its own task, can attach to it.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{body::Body, extract::MatchedPath};
use fastrace::{Span, future::FutureExt, prelude::LocalSpan};
use http::{HeaderMap, Request, Response};
use telemetry::SpanContext;
use tower::Layer;

/// Layer for HTTP tracing
#[derive(Clone)]
pub struct TracingLayer {
    trace_context: bool,
}

impl TracingLayer {
    /// With `trace_context` off, incoming `traceparent` headers are ignored
    /// and every request starts a new trace.
    pub fn new(trace_context: bool) -> Self {
        Self { trace_context }
    }
}

impl<Service> Layer<Service> for TracingLayer
where
    Service: Send + Clone,
{
    type Service = TracingService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        TracingService {
            next,
            trace_context: self.trace_context,
        }
    }
}

/// Service that creates traces for HTTP requests
#[derive(Clone)]
pub struct TracingService<Service> {
    next: Service,
    trace_context: bool,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for TracingService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|matched_path| matched_path.as_str().to_owned())
            .unwrap_or_else(|| req.uri().path().to_owned());

        let method = req.method().to_string();
        let uri = req.uri().to_string();

        let parent = self
            .trace_context
            .then(|| extract_trace_context(req.headers()))
            .flatten()
            .unwrap_or_else(SpanContext::random);

        let root = Span::root(format!("{method} {path}"), parent);

        root.add_property(|| ("http.request.method", method));
        root.add_property(|| ("http.route", path));
        root.add_property(|| ("url.full", uri));

        if let Some(host) = req.headers().get("host").and_then(|h| h.to_str().ok()) {
            let host = host.to_owned();
            root.add_property(|| ("server.address", host));
        }

        let context = SpanContext::from_span(&root).unwrap_or(parent);
        req.extensions_mut().insert(context);

        let mut next = self.next.clone();

        let fut = async move {
            let response = next.call(req).await?;

            let status = response.status();
            LocalSpan::add_property(|| ("http.response.status_code", status.as_u16().to_string()));

            if status.is_client_error() || status.is_server_error() {
                LocalSpan::add_property(|| ("error", "true"));
            }

            Ok(response)
        };

        Box::pin(fut.in_span(root))
    }
}

/// Reads a W3C `traceparent` header, e.g.
/// `00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01`.
fn extract_trace_context(headers: &HeaderMap) -> Option<SpanContext> {
    let traceparent = headers.get("traceparent")?.to_str().ok()?;
    SpanContext::decode_w3c_traceparent(traceparent)
}
