use super::exporters::ExportersConfig;
use serde::Deserialize;

/// Tracing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingConfig {
    /// Whether request spans are recorded at all
    pub enabled: bool,

    /// Continue traces from an incoming W3C `traceparent` header
    pub trace_context: bool,

    /// Override global exporters for traces (optional)
    exporters: Option<ExportersConfig>,
}

impl TracingConfig {
    /// Get the exporters if configured
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trace_context: true,
            exporters: None,
        }
    }
}
