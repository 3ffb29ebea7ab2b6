//! Rate limiting configuration structures.

use duration_str::deserialize_duration;
use serde::Deserialize;
use std::time::Duration;

/// Sliding-window admission limit applied per client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    pub enabled: bool,
    /// Maximum number of admissions per client within `interval`.
    pub limit: u32,
    /// Length of the trailing window.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    /// How often clients with an empty window are forgotten.
    #[serde(deserialize_with = "deserialize_duration")]
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 60,
            interval: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
