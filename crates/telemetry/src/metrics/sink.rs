use tokio::time::Instant;

use super::names::{CHAT_TOKENS_TOTAL, FIRST_TOKEN_LATENCY, MODEL_LATENCY};

/// Label pairs of one metric update. Order does not matter; names must match
/// the catalog entry.
pub type Labels<'a> = &'a [(&'a str, &'a str)];

/// Destination for metric updates.
///
/// Implementations are shared between all in-flight requests. Every method
/// is a single independent update and must be safe to call concurrently.
/// Updates to unknown metrics or with mismatching labels are logged and
/// dropped; they never fail the caller.
pub trait MetricsSink: Send + Sync {
    /// Adds `value` to a counter.
    fn add_counter(&self, name: &str, labels: Labels<'_>, value: f64);

    /// Records one observation in a histogram.
    fn observe_histogram(&self, name: &str, labels: Labels<'_>, value: f64);

    /// Overwrites a gauge.
    fn set_gauge(&self, name: &str, labels: Labels<'_>, value: f64);

    /// Moves a gauge by `delta`. Concurrent deltas on one series never
    /// overwrite each other, so paired `+1`/`-1` updates always return the
    /// gauge to its starting value.
    fn add_gauge(&self, name: &str, labels: Labels<'_>, delta: f64);

    /// Adds one to a counter.
    fn increment_counter(&self, name: &str, labels: Labels<'_>) {
        self.add_counter(name, labels, 1.0);
    }

    /// Folds one finished inference into the catalog: input tokens, output
    /// tokens, total latency since `start`, then the first-token latency if a
    /// token arrived. All four use the same model label.
    fn record_inference(
        &self,
        model: &str,
        start: Instant,
        tokens_in: u64,
        tokens_out: u64,
        first_token: Option<Instant>,
    ) {
        self.add_counter(
            CHAT_TOKENS_TOTAL,
            &[("direction", "input"), ("model", model)],
            tokens_in as f64,
        );

        self.add_counter(
            CHAT_TOKENS_TOTAL,
            &[("direction", "output"), ("model", model)],
            tokens_out as f64,
        );

        self.observe_histogram(
            MODEL_LATENCY,
            &[("model", model), ("operation", "inference")],
            start.elapsed().as_secs_f64(),
        );

        if let Some(first_token) = first_token {
            self.observe_histogram(
                FIRST_TOKEN_LATENCY,
                &[("model", model)],
                first_token.saturating_duration_since(start).as_secs_f64(),
            );
        }
    }
}
