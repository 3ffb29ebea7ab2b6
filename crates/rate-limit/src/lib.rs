//! Per-client admission control for the chat endpoint.
//!
//! Every client key owns a sliding window of admission timestamps. A request
//! is admitted while fewer than `limit` admissions happened for that key in
//! the trailing `interval`; rejected requests leave the window untouched.
//! Windows are sharded per key, so clients never wait on each other.

#![deny(missing_docs)]

mod error;
mod manager;
mod request;
mod window;

pub use error::RateLimitError;
pub use manager::RateLimitManager;
pub use request::{RateLimitRequest, RateLimitRequestBuilder};
pub use window::{Admission, SlidingWindow};
