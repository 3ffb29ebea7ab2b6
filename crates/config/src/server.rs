//! HTTP server configuration settings.

use std::{net::SocketAddr, time::Duration};

use duration_str::deserialize_duration;
use serde::Deserialize;

use crate::{CorsConfig, HealthConfig, RateLimitConfig};

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// Health and readiness endpoints.
    #[serde(default)]
    pub health: HealthConfig,
    /// CORS configuration. A permissive policy applies when absent.
    pub cors: Option<CorsConfig>,
    /// Per-client admission control for the chat endpoint.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    /// Deadlines for writing the streamed answer to the client.
    #[serde(default)]
    pub timeouts: DownstreamTimeouts,
}

/// Deadlines applied to the downstream side of a streamed answer. Exceeding
/// either one ends the relay as a failed downstream write.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownstreamTimeouts {
    /// Maximum time from admission until the first token is written.
    #[serde(deserialize_with = "deserialize_duration")]
    pub first_byte: Duration,
    /// Maximum time for the whole answer.
    #[serde(deserialize_with = "deserialize_duration")]
    pub total: Duration,
}

impl Default for DownstreamTimeouts {
    fn default() -> Self {
        Self {
            first_byte: Duration::from_secs(30),
            total: Duration::from_secs(90),
        }
    }
}
