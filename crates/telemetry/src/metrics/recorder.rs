use std::sync::Arc;

use tokio::time::Instant;

use super::sink::MetricsSink;

/// Measures the time from creation until [`Recorder::record`] and writes it,
/// in seconds, to a histogram of the sink.
///
/// ```rust,ignore
/// let mut recorder = Recorder::new(sink.clone(), HTTP_REQUEST_DURATION);
/// recorder.push_attribute("method", "POST");
/// recorder.push_attribute("endpoint", "/chat");
///
/// let response = next.run(request).await;
/// recorder.record();
/// ```
pub struct Recorder {
    start: Instant,
    sink: Arc<dyn MetricsSink>,
    name: &'static str,
    attributes: Vec<(&'static str, String)>,
}

impl Recorder {
    /// Starts timing immediately.
    pub fn new(sink: Arc<dyn MetricsSink>, name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            sink,
            name,
            attributes: Vec::new(),
        }
    }

    /// Adds a label to the recorded observation.
    pub fn push_attribute(&mut self, key: &'static str, value: impl Into<String>) {
        self.attributes.push((key, value.into()));
    }

    /// Time since the recorder was created.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    /// Records the elapsed time to the histogram.
    pub fn record(self) {
        let labels: Vec<(&str, &str)> = self.attributes.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.sink
            .observe_histogram(self.name, &labels, self.start.elapsed().as_secs_f64());
    }
}
