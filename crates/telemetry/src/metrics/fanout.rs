use std::sync::Arc;

use super::sink::{Labels, MetricsSink};

/// Writes every update to all inner sinks, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl FanoutSink {
    /// Creates a sink forwarding to `sinks`.
    pub fn new(sinks: Vec<Arc<dyn MetricsSink>>) -> Self {
        Self { sinks }
    }

    /// Adds another destination.
    pub fn with(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl MetricsSink for FanoutSink {
    fn add_counter(&self, name: &str, labels: Labels<'_>, value: f64) {
        for sink in &self.sinks {
            sink.add_counter(name, labels, value);
        }
    }

    fn observe_histogram(&self, name: &str, labels: Labels<'_>, value: f64) {
        for sink in &self.sinks {
            sink.observe_histogram(name, labels, value);
        }
    }

    fn set_gauge(&self, name: &str, labels: Labels<'_>, value: f64) {
        for sink in &self.sinks {
            sink.set_gauge(name, labels, value);
        }
    }

    fn add_gauge(&self, name: &str, labels: Labels<'_>, delta: f64) {
        for sink in &self.sinks {
            sink.add_gauge(name, labels, delta);
        }
    }
}
