//! Metrics initialization and the sinks metric updates are written to.

mod fanout;
mod names;
mod otel;
mod recorder;
mod registry;
mod sink;

pub use fanout::FanoutSink;
pub use names::*;
pub use otel::OtelSink;
pub use recorder::Recorder;
pub use registry::PrometheusSink;
pub use sink::{Labels, MetricsSink};

use anyhow::Context;
use config::{OtlpProtocol, TelemetryConfig};
use opentelemetry::{KeyValue, metrics::Meter};
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
};

const METER_NAME: &str = "genai-relay";

/// Get the global meter for recording metrics
pub fn meter() -> Meter {
    opentelemetry::global::meter(METER_NAME)
}

/// Initialize the metrics subsystem
pub(crate) async fn init_metrics(config: &TelemetryConfig) -> anyhow::Result<SdkMeterProvider> {
    let meter_provider = create_otlp_meter_provider(config)?;

    opentelemetry::global::set_meter_provider(meter_provider.clone());

    log::info!(
        "Telemetry metrics initialized for service '{}'",
        config.service_name().unwrap_or(METER_NAME)
    );

    Ok(meter_provider)
}

fn create_otlp_meter_provider(telemetry_config: &TelemetryConfig) -> anyhow::Result<SdkMeterProvider> {
    let Some(exporter_config) = telemetry_config.metrics_otlp_config() else {
        log::debug!("No metrics exporters configured or enabled, metrics are only served for scraping");
        return Ok(SdkMeterProvider::builder().build());
    };

    log::debug!(
        "Initializing OTLP metrics exporter to {} via {:?}",
        exporter_config.endpoint,
        exporter_config.protocol
    );

    let mut builder = Resource::builder();

    if let Some(service_name) = telemetry_config.service_name() {
        builder = builder.with_service_name(service_name.to_string());
    }

    for (key, value) in telemetry_config.resource_attributes() {
        builder = builder.with_attribute(KeyValue::new(key.clone(), value.clone()));
    }

    let exporter = match exporter_config.protocol {
        OtlpProtocol::Grpc => MetricExporter::builder()
            .with_tonic()
            .with_endpoint(exporter_config.endpoint.as_str())
            .with_timeout(exporter_config.timeout)
            .build()
            .context("Failed to create gRPC OTLP metric exporter")?,
        OtlpProtocol::Http => MetricExporter::builder()
            .with_http()
            .with_endpoint(exporter_config.endpoint.as_str())
            .with_timeout(exporter_config.timeout)
            .build()
            .context("Failed to create HTTP OTLP metric exporter")?,
    };

    let reader = PeriodicReader::builder(exporter)
        .with_interval(exporter_config.batch_export.scheduled_delay)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(builder.build())
        .with_reader(reader)
        .build();

    log::info!(
        "OTLP metrics exporter initialized to {} via {:?}",
        exporter_config.endpoint,
        exporter_config.protocol
    );

    Ok(provider)
}
