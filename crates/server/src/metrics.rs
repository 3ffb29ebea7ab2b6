//! HTTP metrics middleware
//!
//! Records for every HTTP request:
//! - `genai_app_http_request_duration_seconds{method, endpoint}`: time until the response head
//! - `genai_app_http_requests_total{method, endpoint, status}`
//!
//! The metrics endpoint itself is not counted.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, extract::MatchedPath};
use http::{Request, Response};
use telemetry::metrics::{HTTP_REQUEST_DURATION, HTTP_REQUESTS_TOTAL, MetricsSink, Recorder};
use tower::Layer;

/// Layer for HTTP metrics tracking
#[derive(Clone)]
pub struct MetricsLayer {
    sink: Arc<dyn MetricsSink>,
    skip_path: Arc<str>,
}

impl MetricsLayer {
    pub fn new(sink: Arc<dyn MetricsSink>, skip_path: &str) -> Self {
        Self {
            sink,
            skip_path: Arc::from(skip_path),
        }
    }
}

impl<Service> Layer<Service> for MetricsLayer
where
    Service: Send + Clone,
{
    type Service = MetricsService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        MetricsService {
            next,
            sink: self.sink.clone(),
            skip_path: self.skip_path.clone(),
        }
    }
}

/// Service that tracks HTTP metrics
#[derive(Clone)]
pub struct MetricsService<Service> {
    next: Service,
    sink: Arc<dyn MetricsSink>,
    skip_path: Arc<str>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for MetricsService<Service>
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

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let endpoint = req
            .extensions()
            .get::<MatchedPath>()
            .map(|matched_path| matched_path.as_str().to_owned())
            .unwrap_or_else(|| "unknown".to_string());

        let mut next = self.next.clone();

        if req.uri().path() == &*self.skip_path {
            return Box::pin(async move { next.call(req).await });
        }

        let sink = self.sink.clone();
        let method = req.method().to_string();

        Box::pin(async move {
            let mut recorder = Recorder::new(sink.clone(), HTTP_REQUEST_DURATION);
            recorder.push_attribute("method", method.clone());
            recorder.push_attribute("endpoint", endpoint.clone());

            let response = next.call(req).await?;
            recorder.record();

            let status = response.status().as_u16().to_string();

            sink.increment_counter(
                HTTP_REQUESTS_TOTAL,
                &[("method", &method), ("endpoint", &endpoint), ("status", &status)],
            );

            Ok(response)
        })
    }
}
