//! Rolling store behind the dashboard summary.
//!
//! Entries are kept for 24 hours. Pruning happens lazily when a summary is
//! read, at most once per hour.

use std::{collections::HashMap, time::Duration};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Measurements of one answered chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageMetrics {
    /// Client or server assigned identifier.
    pub message_id: String,
    /// Estimated prompt tokens.
    pub tokens_in: u64,
    /// Estimated answer tokens.
    pub tokens_out: u64,
    /// Time until the answer was complete.
    pub response_time_ms: f64,
    /// Time until the first token arrived.
    pub time_to_first_token_ms: f64,
}

/// One failed chat request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorLogEntry {
    /// Error classification.
    pub error_type: String,
    /// HTTP status the client saw, zero if none was sent.
    pub status_code: u16,
    /// Length of the user input in bytes.
    pub input_length: u64,
    /// RFC 3339 timestamp of the failure.
    pub timestamp: String,
}

/// Aggregated view served on `/metrics/summary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    /// Answered messages in the retention window.
    pub total_requests: u64,
    /// Mean response time in seconds.
    pub average_response_time: f64,
    /// Sum of answer tokens.
    pub tokens_generated: u64,
    /// Clients seen in the last 30 minutes.
    pub active_users: u64,
    /// Errors divided by errors plus answered messages.
    pub error_rate: f64,
}

struct Entry<T> {
    at: Instant,
    value: T,
}

struct SummaryState {
    messages: Vec<Entry<MessageMetrics>>,
    errors: Vec<Entry<ErrorLogEntry>>,
    sessions: HashMap<String, Instant>,
    last_cleanup: Instant,
}

/// Thread-safe store of recent message and error records.
pub struct SummaryStore {
    state: RwLock<SummaryState>,
}

impl Default for SummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SummaryState {
                messages: Vec::new(),
                errors: Vec::new(),
                sessions: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
        }
    }

    /// Stores an answered message and marks the client as active.
    pub fn record_message(&self, client_key: &str, metrics: MessageMetrics) {
        let now = Instant::now();
        let mut state = self.state.write();

        state.messages.push(Entry { at: now, value: metrics });
        state.sessions.insert(client_key.to_owned(), now);
    }

    /// Stores a failed request.
    pub fn record_error(&self, entry: ErrorLogEntry) {
        let now = Instant::now();
        self.state.write().errors.push(Entry { at: now, value: entry });
    }

    /// Computes the dashboard view over the retention window.
    pub fn summary(&self) -> MetricsSummary {
        self.cleanup();

        let now = Instant::now();
        let state = self.state.read();

        let total_requests = state.messages.len() as u64;
        let total_errors = state.errors.len() as u64;

        let total_response_time: f64 = state
            .messages
            .iter()
            .map(|entry| entry.value.response_time_ms / 1000.0)
            .sum();

        let tokens_generated = state.messages.iter().map(|entry| entry.value.tokens_out).sum();

        let active_users = state
            .sessions
            .values()
            .filter(|seen| now.duration_since(**seen) < SESSION_TIMEOUT)
            .count() as u64;

        let average_response_time = if total_requests > 0 {
            total_response_time / total_requests as f64
        } else {
            0.0
        };

        let error_rate = if total_requests + total_errors > 0 {
            total_errors as f64 / (total_requests + total_errors) as f64
        } else {
            0.0
        };

        MetricsSummary {
            total_requests,
            average_response_time,
            tokens_generated,
            active_users,
            error_rate,
        }
    }

    /// Drops entries past retention and idle sessions. Does nothing if the
    /// previous cleanup was less than an hour ago.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut state = self.state.write();

        if now.duration_since(state.last_cleanup) < CLEANUP_INTERVAL {
            return;
        }

        state.messages.retain(|entry| now.duration_since(entry.at) < RETENTION);
        state.errors.retain(|entry| now.duration_since(entry.at) < RETENTION);
        state.sessions.retain(|_, seen| now.duration_since(*seen) < SESSION_TIMEOUT);
        state.last_cleanup = now;

        log::info!(
            "Cleaned up summary metrics: {} messages, {} errors, {} active users",
            state.messages.len(),
            state.errors.len(),
            state.sessions.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use tokio::time;

    use super::*;

    fn message(tokens_out: u64, response_time_ms: f64) -> MessageMetrics {
        MessageMetrics {
            message_id: String::from("m"),
            tokens_in: 2,
            tokens_out,
            response_time_ms,
            time_to_first_token_ms: 10.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_store() {
        let store = SummaryStore::new();

        let summary = serde_json::to_value(store.summary()).unwrap();

        assert_eq!(
            summary,
            serde_json::json!({
                "totalRequests": 0,
                "averageResponseTime": 0.0,
                "tokensGenerated": 0,
                "activeUsers": 0,
                "errorRate": 0.0,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn aggregates_messages_and_errors() {
        let store = SummaryStore::new();

        store.record_message("10.0.0.1", message(10, 1000.0));
        store.record_message("10.0.0.1", message(30, 3000.0));
        store.record_message("10.0.0.2", message(5, 2000.0));
        store.record_error(ErrorLogEntry {
            error_type: String::from("stream_error"),
            status_code: 502,
            ..Default::default()
        });

        let summary = store.summary();

        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.tokens_generated, 45);
        assert_eq!(summary.average_response_time, 2.0);
        assert_eq!(summary.active_users, 2);
        assert_eq!(summary.error_rate, 0.25);
    }

    #[tokio::test(start_paused = true)]
    async fn users_go_idle_after_thirty_minutes() {
        let store = SummaryStore::new();

        store.record_message("10.0.0.1", message(1, 100.0));
        time::advance(Duration::from_secs(20 * 60)).await;
        store.record_message("10.0.0.2", message(1, 100.0));
        time::advance(Duration::from_secs(15 * 60)).await;

        assert_eq!(store.summary().active_users, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_a_day() {
        let store = SummaryStore::new();

        store.record_message("a", message(7, 100.0));
        store.record_error(ErrorLogEntry::default());

        time::advance(Duration::from_secs(23 * 60 * 60)).await;
        store.record_message("b", message(3, 100.0));

        assert_eq!(store.summary().total_requests, 2);

        time::advance(Duration::from_secs(60 * 60)).await;

        let summary = store.summary();

        assert_eq!(summary.total_requests, 1);
        assert_eq!(summary.tokens_generated, 3);
        assert_eq!(summary.error_rate, 0.0);
    }

    #[test]
    fn frontend_payload_with_missing_fields() {
        let metrics: MessageMetrics = serde_json::from_str(r#"{"message_id":"abc","tokens_out":12}"#).unwrap();

        assert_eq!(metrics.message_id, "abc");
        assert_eq!(metrics.tokens_out, 12);
        assert_eq!(metrics.tokens_in, 0);
    }
}
