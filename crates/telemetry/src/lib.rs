//! Telemetry for the relay.
//!
//! Metrics go through the [`metrics::MetricsSink`] trait, backed by a
//! Prometheus registry for scraping and OpenTelemetry instruments for OTLP
//! push. Traces are recorded with fastrace and exported over OTLP.

pub mod metrics;
pub mod summary;
pub mod tracing;

use config::TelemetryConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;

pub use fastrace::{Span, collector::SpanContext};

/// Guard that ensures proper cleanup of telemetry resources
pub struct TelemetryGuard {
    meter_provider: SdkMeterProvider,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.meter_provider.shutdown() {
            log::error!("Failed to shutdown meter provider: {e}");
        }
    }
}

/// Initialize the OpenTelemetry meter provider.
///
/// The guard must outlive every [`metrics::OtelSink`] that should export.
pub async fn init(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    let meter_provider = metrics::init_metrics(config).await?;

    Ok(TelemetryGuard { meter_provider })
}
