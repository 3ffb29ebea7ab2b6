use std::collections::HashMap;

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

use super::{
    names::{CATALOG, MetricDescriptor, MetricKind},
    sink::{Labels, MetricsSink},
};

/// Keeps the metric catalog in a Prometheus registry and renders the text
/// exposition served on `/metrics`.
pub struct PrometheusSink {
    registry: Registry,
    counters: HashMap<&'static str, CounterVec>,
    histograms: HashMap<&'static str, HistogramVec>,
    gauges: HashMap<&'static str, GaugeVec>,
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusSink {
    /// Creates a sink with its own registry holding the full catalog.
    pub fn new() -> Self {
        let mut sink = Self {
            registry: Registry::new(),
            counters: HashMap::new(),
            histograms: HashMap::new(),
            gauges: HashMap::new(),
        };

        for descriptor in CATALOG {
            if let Err(e) = sink.register(descriptor) {
                log::error!("Failed to register metric {}: {e}", descriptor.name);
            }
        }

        sink
    }

    fn register(&mut self, descriptor: &MetricDescriptor) -> prometheus::Result<()> {
        let opts = Opts::new(descriptor.name, descriptor.help);

        match descriptor.kind {
            MetricKind::Counter => {
                let vec = CounterVec::new(opts, descriptor.labels)?;
                self.registry.register(Box::new(vec.clone()))?;
                self.counters.insert(descriptor.name, vec);
            }
            MetricKind::Gauge => {
                let vec = GaugeVec::new(opts, descriptor.labels)?;
                self.registry.register(Box::new(vec.clone()))?;
                self.gauges.insert(descriptor.name, vec);
            }
            MetricKind::Histogram { buckets } => {
                let opts = HistogramOpts::from(opts).buckets(buckets.to_vec());
                let vec = HistogramVec::new(opts, descriptor.labels)?;
                self.registry.register(Box::new(vec.clone()))?;
                self.histograms.insert(descriptor.name, vec);
            }
        }

        Ok(())
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();

        encoder.encode(&self.registry.gather(), &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Content type of [`PrometheusSink::render`].
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Current value of a counter series, zero if it was never touched.
    pub fn counter_value(&self, name: &str, labels: Labels<'_>) -> f64 {
        self.counters
            .get(name)
            .and_then(|vec| {
                let values = label_values(name, vec_labels(name), labels)?;
                vec.get_metric_with_label_values(&values).ok()
            })
            .map(|counter| counter.get())
            .unwrap_or_default()
    }

    /// Number of observations in a histogram series.
    pub fn histogram_count(&self, name: &str, labels: Labels<'_>) -> u64 {
        self.histograms
            .get(name)
            .and_then(|vec| {
                let values = label_values(name, vec_labels(name), labels)?;
                vec.get_metric_with_label_values(&values).ok()
            })
            .map(|histogram| histogram.get_sample_count())
            .unwrap_or_default()
    }

    /// Current value of a gauge series.
    pub fn gauge_value(&self, name: &str, labels: Labels<'_>) -> f64 {
        self.gauges
            .get(name)
            .and_then(|vec| {
                let values = label_values(name, vec_labels(name), labels)?;
                vec.get_metric_with_label_values(&values).ok()
            })
            .map(|gauge| gauge.get())
            .unwrap_or_default()
    }
}

impl MetricsSink for PrometheusSink {
    fn add_counter(&self, name: &str, labels: Labels<'_>, value: f64) {
        let Some(vec) = self.counters.get(name) else {
            log::warn!("Ignoring update of unknown counter {name}");
            return;
        };

        if value < 0.0 {
            log::warn!("Ignoring negative increment {value} of counter {name}");
            return;
        }

        let Some(values) = label_values(name, vec_labels(name), labels) else {
            return;
        };

        match vec.get_metric_with_label_values(&values) {
            Ok(counter) => counter.inc_by(value),
            Err(e) => log::warn!("Ignoring update of counter {name}: {e}"),
        }
    }

    fn observe_histogram(&self, name: &str, labels: Labels<'_>, value: f64) {
        let Some(vec) = self.histograms.get(name) else {
            log::warn!("Ignoring observation of unknown histogram {name}");
            return;
        };

        let Some(values) = label_values(name, vec_labels(name), labels) else {
            return;
        };

        match vec.get_metric_with_label_values(&values) {
            Ok(histogram) => histogram.observe(value),
            Err(e) => log::warn!("Ignoring observation of histogram {name}: {e}"),
        }
    }

    fn set_gauge(&self, name: &str, labels: Labels<'_>, value: f64) {
        if let Some(gauge) = self.gauge(name, labels) {
            gauge.set(value);
        }
    }

    fn add_gauge(&self, name: &str, labels: Labels<'_>, delta: f64) {
        if let Some(gauge) = self.gauge(name, labels) {
            gauge.add(delta);
        }
    }
}

impl PrometheusSink {
    fn gauge(&self, name: &str, labels: Labels<'_>) -> Option<prometheus::Gauge> {
        let Some(vec) = self.gauges.get(name) else {
            log::warn!("Ignoring update of unknown gauge {name}");
            return None;
        };

        let values = label_values(name, vec_labels(name), labels)?;

        match vec.get_metric_with_label_values(&values) {
            Ok(gauge) => Some(gauge),
            Err(e) => {
                log::warn!("Ignoring update of gauge {name}: {e}");
                None
            }
        }
    }
}

fn vec_labels(name: &str) -> &'static [&'static str] {
    super::names::descriptor(name)
        .map(|descriptor| descriptor.labels)
        .unwrap_or_default()
}

/// Orders the given label values like the catalog entry. Returns `None` and
/// logs if a label is missing or unexpected.
fn label_values<'a>(name: &str, expected: &[&str], labels: Labels<'a>) -> Option<Vec<&'a str>> {
    if labels.len() != expected.len() {
        log::warn!(
            "Ignoring update of {name}: expected labels {expected:?}, got {:?}",
            labels.iter().map(|(key, _)| key).collect::<Vec<_>>()
        );
        return None;
    }

    expected
        .iter()
        .map(|key| {
            let value = labels.iter().find(|(candidate, _)| candidate == key).map(|(_, value)| *value);

            if value.is_none() {
                log::warn!("Ignoring update of {name}: label {key} is missing");
            }

            value
        })
        .collect()
}
