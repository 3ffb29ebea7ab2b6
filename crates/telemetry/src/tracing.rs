//! Distributed tracing with fastrace, exported over OTLP

mod request;

pub use request::{RequestTrace, TraceOutcome};

use anyhow::Context;
use config::TelemetryConfig;
use fastrace::collector::Config as CollectorConfig;
use fastrace_opentelemetry::OpenTelemetryReporter;
use opentelemetry::{InstrumentationScope, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use std::borrow::Cow;

const DEFAULT_SERVICE_NAME: &str = "genai-relay";

/// Flushes pending spans when dropped
pub struct TracingGuard;

impl Drop for TracingGuard {
    fn drop(&mut self) {
        fastrace::flush();
    }
}

/// Installs the OTLP span reporter. Without one, spans cost next to nothing
/// and are discarded.
pub async fn init_tracing(config: &TelemetryConfig) -> anyhow::Result<TracingGuard> {
    if !config.tracing().enabled {
        log::debug!("Tracing is disabled in configuration");
        return Ok(TracingGuard);
    }

    let Some(otlp_config) = config.traces_otlp_config() else {
        log::debug!("No OTLP exporter configured for traces, spans are not exported");
        return Ok(TracingGuard);
    };

    let service_name = config.service_name().unwrap_or(DEFAULT_SERVICE_NAME).to_string();
    let mut resource_attributes = vec![KeyValue::new("service.name", service_name.clone())];

    for (key, value) in config.resource_attributes() {
        resource_attributes.push(KeyValue::new(key.clone(), value.clone()));
    }

    let resource = Resource::builder_empty().with_attributes(resource_attributes).build();

    log::debug!(
        "Creating OTLP span exporter with endpoint: {}, protocol: {:?}",
        otlp_config.endpoint,
        otlp_config.protocol
    );

    let exporter = match otlp_config.protocol {
        config::OtlpProtocol::Grpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(otlp_config.endpoint.to_string())
            .with_timeout(otlp_config.timeout)
            .build()
            .context("Failed to build gRPC OTLP span exporter")?,
        config::OtlpProtocol::Http => SpanExporter::builder()
            .with_http()
            .with_endpoint(otlp_config.endpoint.to_string())
            .with_timeout(otlp_config.timeout)
            .build()
            .context("Failed to build HTTP OTLP span exporter")?,
    };

    let instrumentation_scope = InstrumentationScope::builder(DEFAULT_SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .build();

    let reporter = OpenTelemetryReporter::new(exporter, Cow::Owned(resource), instrumentation_scope);
    let collector_config = CollectorConfig::default().report_interval(otlp_config.batch_export.scheduled_delay);

    fastrace::set_reporter(reporter, collector_config);

    log::info!("Tracing initialized for service {service_name}, exporting to {}", otlp_config.endpoint);

    Ok(TracingGuard)
}
