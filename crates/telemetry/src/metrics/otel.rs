use std::collections::HashMap;

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, UpDownCounter},
};
use parking_lot::Mutex;

use super::{
    meter,
    names::{CATALOG, MetricKind},
    sink::{Labels, MetricsSink},
};

/// Forwards metric updates to OpenTelemetry instruments on the global meter,
/// exported over OTLP when configured.
///
/// Gauges are up-down counters. The sink keeps the level of every gauge
/// series so an absolute `set_gauge` can be sent as the difference to the
/// current level; all gauge updates go through one lock, in order.
pub struct OtelSink {
    counters: HashMap<&'static str, Counter<f64>>,
    histograms: HashMap<&'static str, Histogram<f64>>,
    gauges: HashMap<&'static str, UpDownCounter<f64>>,
    levels: Mutex<HashMap<String, f64>>,
}

impl Default for OtelSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OtelSink {
    /// Creates one instrument per catalog entry. Call after [`crate::init`],
    /// instruments created earlier stay bound to the no-op provider.
    pub fn new() -> Self {
        let meter = meter();

        let mut counters = HashMap::new();
        let mut histograms = HashMap::new();
        let mut gauges = HashMap::new();

        for descriptor in CATALOG {
            match descriptor.kind {
                MetricKind::Counter => {
                    let counter = meter.f64_counter(descriptor.name).with_description(descriptor.help).build();
                    counters.insert(descriptor.name, counter);
                }
                MetricKind::Gauge => {
                    let gauge = meter
                        .f64_up_down_counter(descriptor.name)
                        .with_description(descriptor.help)
                        .build();
                    gauges.insert(descriptor.name, gauge);
                }
                MetricKind::Histogram { buckets } => {
                    let histogram = meter
                        .f64_histogram(descriptor.name)
                        .with_description(descriptor.help)
                        .with_unit("s")
                        .with_boundaries(buckets.to_vec())
                        .build();

                    histograms.insert(descriptor.name, histogram);
                }
            }
        }

        Self {
            counters,
            histograms,
            gauges,
            levels: Mutex::new(HashMap::new()),
        }
    }

    /// Applies `update` to the level of one gauge series and forwards the
    /// resulting difference. Returns the new level.
    fn move_gauge(&self, name: &str, labels: Labels<'_>, update: impl FnOnce(f64) -> f64) -> Option<f64> {
        let Some(gauge) = self.gauges.get(name) else {
            log::warn!("Ignoring update of unknown gauge {name}");
            return None;
        };

        let mut levels = self.levels.lock();
        let level = levels.entry(series_key(name, labels)).or_default();
        let next = update(*level);

        gauge.add(next - *level, &attributes(labels));
        *level = next;

        Some(next)
    }
}

impl MetricsSink for OtelSink {
    fn add_counter(&self, name: &str, labels: Labels<'_>, value: f64) {
        match self.counters.get(name) {
            Some(counter) => counter.add(value, &attributes(labels)),
            None => log::warn!("Ignoring update of unknown counter {name}"),
        }
    }

    fn observe_histogram(&self, name: &str, labels: Labels<'_>, value: f64) {
        match self.histograms.get(name) {
            Some(histogram) => histogram.record(value, &attributes(labels)),
            None => log::warn!("Ignoring observation of unknown histogram {name}"),
        }
    }

    fn set_gauge(&self, name: &str, labels: Labels<'_>, value: f64) {
        self.move_gauge(name, labels, |_| value);
    }

    fn add_gauge(&self, name: &str, labels: Labels<'_>, delta: f64) {
        self.move_gauge(name, labels, |level| level + delta);
    }
}

/// Identifies a gauge series independent of label order.
fn series_key(name: &str, labels: Labels<'_>) -> String {
    let mut labels = labels.to_vec();
    labels.sort_unstable();

    let mut key = name.to_string();

    for (label, value) in labels {
        key.push_str(&format!(",{label}={value}"));
    }

    key
}

fn attributes(labels: Labels<'_>) -> Vec<KeyValue> {
    labels
        .iter()
        .map(|(key, value)| KeyValue::new(key.to_string(), value.to_string()))
        .collect()
}
