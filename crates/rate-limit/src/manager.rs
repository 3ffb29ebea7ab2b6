//! Rate limit manager implementation.

use std::sync::Arc;

use config::RateLimitConfig;
use telemetry::metrics::{ERRORS_TOTAL, MetricsSink};

use crate::{
    error::RateLimitError,
    request::RateLimitRequest,
    window::{Admission, SlidingWindow},
};

/// Applies the configured per-client limit and reports rejections.
pub struct RateLimitManager {
    enabled: bool,
    window: SlidingWindow,
    metrics: Arc<dyn MetricsSink>,
}

impl RateLimitManager {
    /// Create a new rate limit manager from the server configuration.
    pub fn new(config: &RateLimitConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            enabled: config.enabled,
            window: SlidingWindow::new(config.limit, config.interval),
            metrics,
        }
    }

    /// Whether requests are checked at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Admits the request or rejects it with the time until the client may retry.
    ///
    /// A rejection increments `genai_app_errors_total{type="rate_limit",operation="api"}`
    /// once and changes nothing else.
    pub fn check(&self, request: &RateLimitRequest) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }

        match self.window.check(request.client_key()) {
            Admission::Allowed => Ok(()),
            Admission::Rejected { retry_after } => {
                log::debug!(
                    "Request blocked for client '{}', retry after {retry_after:?}",
                    request.client_key()
                );

                self.metrics
                    .increment_counter(ERRORS_TOTAL, &[("type", "rate_limit"), ("operation", "api")]);

                Err(RateLimitError::LimitExceeded { retry_after })
            }
        }
    }

    /// Forgets clients that have no admission left inside the window.
    pub fn sweep(&self) -> usize {
        let removed = self.window.sweep();

        if removed > 0 {
            log::debug!(
                "Evicted {removed} idle rate limit windows, {} still tracked",
                self.window.tracked_keys()
            );
        }

        removed
    }
}
