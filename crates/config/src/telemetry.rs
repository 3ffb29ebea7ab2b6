use std::collections::BTreeMap;

use serde::Deserialize;

pub mod exporters;
pub mod metrics;
pub mod tracing;

pub use self::exporters::{ExportersConfig, OtlpExporterConfig};
pub use self::metrics::MetricsConfig;
pub use self::tracing::TracingConfig;

/// Telemetry configuration for observability
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Service name reported with traces and pushed metrics
    service_name: Option<String>,

    /// Custom resource attributes to attach to all telemetry
    resource_attributes: BTreeMap<String, String>,

    /// Exporters shared by traces and metrics
    exporters: ExportersConfig,

    /// Tracing-specific configuration
    tracing: TracingConfig,

    /// Metrics-specific configuration
    metrics: MetricsConfig,
}

impl TelemetryConfig {
    /// Get the service name
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Get the resource attributes
    pub fn resource_attributes(&self) -> &BTreeMap<String, String> {
        &self.resource_attributes
    }

    /// Get the global exporters configuration
    pub fn global_exporters(&self) -> &ExportersConfig {
        &self.exporters
    }

    /// Get the tracing configuration
    pub fn tracing(&self) -> &TracingConfig {
        &self.tracing
    }

    /// Get the metrics configuration
    pub fn metrics(&self) -> &MetricsConfig {
        &self.metrics
    }

    /// The OTLP exporter for metrics, if one is enabled.
    /// Metrics-specific exporters take precedence over the global ones.
    pub fn metrics_otlp_config(&self) -> Option<&OtlpExporterConfig> {
        let exporters = self.metrics.exporters().unwrap_or(&self.exporters);
        exporters.otlp.enabled.then_some(&exporters.otlp)
    }

    /// The OTLP exporter for traces, if tracing and an exporter are enabled.
    pub fn traces_otlp_config(&self) -> Option<&OtlpExporterConfig> {
        if !self.tracing.enabled {
            return None;
        }

        let exporters = self.tracing.exporters().unwrap_or(&self.exporters);
        exporters.otlp.enabled.then_some(&exporters.otlp)
    }
}
