//! Error types for rate limiting.

use std::time::Duration;

/// Errors that can occur during rate limiting.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The client used up its quota for the current window.
    #[error("Rate limit exceeded. Please try again later.")]
    LimitExceeded {
        /// Time until the oldest admission leaves the window.
        retry_after: Duration,
    },
}

impl RateLimitError {
    /// Get the retry-after duration.
    pub fn retry_after(&self) -> Duration {
        match self {
            Self::LimitExceeded { retry_after } => *retry_after,
        }
    }
}
