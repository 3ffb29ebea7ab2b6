//! Request information for rate limiting.

use std::net::IpAddr;

const UNKNOWN_CLIENT: &str = "unknown";

/// Information about a request that needs to be rate limited.
#[derive(Debug, Clone)]
pub struct RateLimitRequest {
    client_key: String,
}

impl RateLimitRequest {
    /// Create a new builder for a rate limit request.
    pub fn builder() -> RateLimitRequestBuilder {
        RateLimitRequestBuilder::default()
    }

    /// The key the sliding window is tracked under.
    pub fn client_key(&self) -> &str {
        &self.client_key
    }
}

/// Builder for creating rate limit requests.
///
/// The first source that was set wins, in this order: the connecting
/// address, the first `X-Forwarded-For` entry, `X-Real-IP`. Requests with
/// none of them share the `unknown` key.
#[derive(Debug, Default)]
pub struct RateLimitRequestBuilder {
    ip: Option<IpAddr>,
    forwarded_for: Option<String>,
    real_ip: Option<String>,
}

impl RateLimitRequestBuilder {
    /// Set the connecting IP address.
    pub fn ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Set the raw value of the `X-Forwarded-For` header.
    pub fn forwarded_for(mut self, value: &str) -> Self {
        let first = value.split(',').next().map(str::trim).filter(|s| !s.is_empty());
        self.forwarded_for = first.map(ToOwned::to_owned);
        self
    }

    /// Set the value of the `X-Real-IP` header.
    pub fn real_ip(mut self, value: &str) -> Self {
        let value = value.trim();

        if !value.is_empty() {
            self.real_ip = Some(value.to_owned());
        }

        self
    }

    /// Build the rate limit request.
    pub fn build(self) -> RateLimitRequest {
        let client_key = match (self.ip, self.forwarded_for, self.real_ip) {
            (Some(ip), _, _) => ip.to_string(),
            (None, Some(forwarded), _) => forwarded,
            (None, None, Some(real_ip)) => real_ip,
            (None, None, None) => UNKNOWN_CLIENT.to_owned(),
        };

        RateLimitRequest { client_key }
    }
}
