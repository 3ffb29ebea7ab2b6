use duration_str::deserialize_duration;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Exporters configuration for telemetry
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExportersConfig {
    /// OTLP exporter configuration
    pub otlp: OtlpExporterConfig,
}

/// OTLP exporter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OtlpExporterConfig {
    /// Whether this exporter is enabled
    pub enabled: bool,

    /// Collector endpoint
    pub endpoint: Url,

    /// Protocol to use (grpc or http)
    pub protocol: OtlpProtocol,

    /// Export request timeout
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    /// Batching of exported data
    pub batch_export: BatchExportConfig,
}

impl Default for OtlpExporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: Url::parse("http://localhost:4317").expect("default URL should be valid"),
            protocol: OtlpProtocol::default(),
            timeout: Duration::from_secs(10),
            batch_export: BatchExportConfig::default(),
        }
    }
}

/// OTLP protocol selection
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    /// gRPC protocol (default)
    #[default]
    Grpc,
    /// HTTP/protobuf protocol
    Http,
}

/// Batch export configuration for OTLP, shared by spans and metrics
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchExportConfig {
    /// Delay between two exports
    #[serde(deserialize_with = "deserialize_duration")]
    pub scheduled_delay: Duration,
}

impl Default for BatchExportConfig {
    fn default() -> Self {
        Self {
            scheduled_delay: Duration::from_secs(5),
        }
    }
}
