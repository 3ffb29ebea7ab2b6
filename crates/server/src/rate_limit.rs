//! Client identification and per-client admission for the chat route.

use std::{
    convert::Infallible,
    fmt::Display,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts},
    response::IntoResponse,
};
use http::{HeaderMap, Request, Response, StatusCode, header::CONTENT_TYPE, request::Parts};
use rate_limit::{RateLimitManager, RateLimitRequest};
use tower::Layer;

/// The key a client is tracked under: its address, or what the proxy in
/// front of us reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClientKey(pub(crate) String);

impl ClientKey {
    fn identify(extensions: &http::Extensions, headers: &HeaderMap) -> Self {
        Self(rate_limit_request(extensions, headers).client_key().to_owned())
    }
}

fn rate_limit_request(extensions: &http::Extensions, headers: &HeaderMap) -> RateLimitRequest {
    let mut builder = RateLimitRequest::builder();

    if let Some(ConnectInfo(address)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        builder = builder.ip(address.ip());
    }

    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        builder = builder.forwarded_for(value);
    }

    if let Some(value) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        builder = builder.real_ip(value);
    }

    builder.build()
}

impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<ClientKey>() {
            Some(key) => Ok(key.clone()),
            None => Ok(Self::identify(&parts.extensions, &parts.headers)),
        }
    }
}

#[derive(Clone)]
pub(crate) struct RateLimitLayer(Arc<RateLimitManager>);

impl RateLimitLayer {
    pub fn new(manager: Arc<RateLimitManager>) -> Self {
        Self(manager)
    }
}

impl<Service> Layer<Service> for RateLimitLayer
where
    Service: Send + Clone,
{
    type Service = RateLimitService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        RateLimitService {
            next,
            manager: self.0.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct RateLimitService<Service> {
    next: Service,
    manager: Arc<RateLimitManager>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for RateLimitService<Service>
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
        let mut next = self.next.clone();
        let manager = self.manager.clone();

        Box::pin(async move {
            let request = rate_limit_request(req.extensions(), req.headers());

            // Only submissions count against the quota.
            if req.method() == http::Method::POST
                && let Err(err) = manager.check(&request)
            {
                log::debug!("Request from {} rejected: {err}", request.client_key());

                let response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                    "Rate limit exceeded",
                )
                    .into_response();

                return Ok(response);
            }

            req.extensions_mut().insert(ClientKey(request.client_key().to_owned()));
            next.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn identify(connect: Option<SocketAddr>, headers: &[(&'static str, &'static str)]) -> String {
        let mut request = Request::builder();

        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let mut request = request.body(()).unwrap();

        if let Some(address) = connect {
            request.extensions_mut().insert(ConnectInfo(address));
        }

        ClientKey::identify(request.extensions(), request.headers()).0
    }

    #[test]
    fn connecting_address_first() {
        let address = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)), 41234);

        assert_eq!(identify(Some(address), &[("x-forwarded-for", "192.0.2.1")]), "10.1.2.3");
    }

    #[test]
    fn proxy_headers_in_order() {
        assert_eq!(
            identify(None, &[("x-forwarded-for", "192.0.2.1, 10.0.0.1"), ("x-real-ip", "192.0.2.9")]),
            "192.0.2.1"
        );
        assert_eq!(identify(None, &[("x-real-ip", "192.0.2.9")]), "192.0.2.9");
        assert_eq!(identify(None, &[]), "unknown");
    }
}
