//! The fixed metric catalog. Every sink registers exactly these metrics.

/// HTTP requests by method, endpoint and status code.
pub const HTTP_REQUESTS_TOTAL: &str = "genai_app_http_requests_total";
/// HTTP request duration in seconds by method and endpoint.
pub const HTTP_REQUEST_DURATION: &str = "genai_app_http_request_duration_seconds";
/// Estimated chat tokens by direction (`input`, `output`) and model.
pub const CHAT_TOKENS_TOTAL: &str = "genai_app_chat_tokens_total";
/// Total model latency in seconds by model and operation.
pub const MODEL_LATENCY: &str = "genai_app_model_latency_seconds";
/// Time until the first streamed token in seconds by model.
pub const FIRST_TOKEN_LATENCY: &str = "genai_app_first_token_latency_seconds";
/// Errors by type and operation.
pub const ERRORS_TOTAL: &str = "genai_app_errors_total";
/// Chat requests currently being relayed.
pub const ACTIVE_REQUESTS: &str = "genai_app_active_requests";
/// Finished chat requests by model and terminal status.
pub const CHAT_REQUESTS_TOTAL: &str = "genai_app_chat_requests_total";

/// Prometheus client default buckets.
const HTTP_DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
const MODEL_LATENCY_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0];
const FIRST_TOKEN_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.0, 5.0];

/// What kind of instrument a catalog entry is.
#[derive(Debug, Clone, Copy)]
pub enum MetricKind {
    /// Monotonic sum.
    Counter,
    /// Last written value.
    Gauge,
    /// Distribution with fixed bucket boundaries.
    Histogram {
        /// Upper bounds of the buckets.
        buckets: &'static [f64],
    },
}

/// One entry of the metric catalog.
#[derive(Debug, Clone, Copy)]
pub struct MetricDescriptor {
    /// Metric name.
    pub name: &'static str,
    /// Help text shown in the exposition.
    pub help: &'static str,
    /// Instrument kind.
    pub kind: MetricKind,
    /// Label names, in exposition order.
    pub labels: &'static [&'static str],
}

/// All metrics the relay emits.
pub const CATALOG: &[MetricDescriptor] = &[
    MetricDescriptor {
        name: HTTP_REQUESTS_TOTAL,
        help: "Total number of HTTP requests",
        kind: MetricKind::Counter,
        labels: &["method", "endpoint", "status"],
    },
    MetricDescriptor {
        name: HTTP_REQUEST_DURATION,
        help: "HTTP request duration in seconds",
        kind: MetricKind::Histogram {
            buckets: HTTP_DURATION_BUCKETS,
        },
        labels: &["method", "endpoint"],
    },
    MetricDescriptor {
        name: CHAT_TOKENS_TOTAL,
        help: "Total number of tokens processed in chat",
        kind: MetricKind::Counter,
        labels: &["direction", "model"],
    },
    MetricDescriptor {
        name: MODEL_LATENCY,
        help: "Model response time in seconds",
        kind: MetricKind::Histogram {
            buckets: MODEL_LATENCY_BUCKETS,
        },
        labels: &["model", "operation"],
    },
    MetricDescriptor {
        name: FIRST_TOKEN_LATENCY,
        help: "Time to first token in seconds",
        kind: MetricKind::Histogram {
            buckets: FIRST_TOKEN_BUCKETS,
        },
        labels: &["model"],
    },
    MetricDescriptor {
        name: ERRORS_TOTAL,
        help: "Total number of errors",
        kind: MetricKind::Counter,
        labels: &["type", "operation"],
    },
    MetricDescriptor {
        name: ACTIVE_REQUESTS,
        help: "Number of currently active requests",
        kind: MetricKind::Gauge,
        labels: &[],
    },
    MetricDescriptor {
        name: CHAT_REQUESTS_TOTAL,
        help: "Total number of chat requests by terminal status",
        kind: MetricKind::Counter,
        labels: &["model", "status"],
    },
];

/// Looks up a catalog entry by name.
pub fn descriptor(name: &str) -> Option<&'static MetricDescriptor> {
    CATALOG.iter().find(|descriptor| descriptor.name == name)
}
