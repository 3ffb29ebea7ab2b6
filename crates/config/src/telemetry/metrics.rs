use std::{borrow::Cow, net::SocketAddr};

use super::exporters::ExportersConfig;
use serde::Deserialize;

/// Metrics-specific configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Serve the Prometheus exposition on a separate address instead of the main listener
    pub listen: Option<SocketAddr>,

    /// Path of the Prometheus exposition endpoint
    pub path: Cow<'static, str>,

    /// Override global exporters for metrics (optional)
    exporters: Option<ExportersConfig>,
}

impl MetricsConfig {
    /// Get the exporters if configured
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen: None,
            path: Cow::Borrowed("/metrics"),
            exporters: None,
        }
    }
}
