//! Sliding-window admission state.

use std::{collections::VecDeque, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;

/// Outcome of a single admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request was admitted and its timestamp recorded.
    Allowed,
    /// The window is full. Nothing was recorded.
    Rejected {
        /// Time until the oldest admission leaves the window.
        retry_after: Duration,
    },
}

impl Admission {
    /// Whether the request may proceed.
    pub fn is_allowed(self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Admission timestamps per client key within a trailing window.
///
/// The read-modify-write of one key happens under that key's shard lock, so
/// concurrent admissions for the same client can never exceed the limit.
/// Different keys only contend when they hash to the same shard.
pub struct SlidingWindow {
    limit: usize,
    interval: Duration,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindow {
    /// Creates a window admitting `limit` requests per `interval` and key.
    pub fn new(limit: u32, interval: Duration) -> Self {
        Self {
            limit: limit as usize,
            interval,
            windows: DashMap::new(),
        }
    }

    /// Returns true and records the admission if the key has room left.
    pub fn admit(&self, key: &str) -> bool {
        self.check(key).is_allowed()
    }

    /// Like [`SlidingWindow::admit`], but tells how long a rejected client should wait.
    pub fn check(&self, key: &str) -> Admission {
        let now = Instant::now();

        let mut window = match self.windows.get_mut(key) {
            Some(window) => window,
            None => self.windows.entry(key.to_owned()).or_default(),
        };

        prune(&mut window, now, self.interval);

        if window.len() < self.limit {
            window.push_back(now);
            return Admission::Allowed;
        }

        let retry_after = window
            .front()
            .map(|oldest| self.interval.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(self.interval);

        Admission::Rejected { retry_after }
    }

    /// Forgets every key without an admission inside the window. Returns the
    /// number of keys removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();

        self.windows.retain(|_, window| {
            prune(window, now, self.interval);
            !window.is_empty()
        });

        before.saturating_sub(self.windows.len())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Drops timestamps at least `interval` old. A timestamp exactly one
/// interval in the past no longer counts.
fn prune(window: &mut VecDeque<Instant>, now: Instant, interval: Duration) {
    while let Some(oldest) = window.front() {
        if now.duration_since(*oldest) < interval {
            break;
        }

        window.pop_front();
    }
}
