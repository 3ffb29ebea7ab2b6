//! Health and readiness endpoint configuration.

use std::borrow::Cow;

use serde::Deserialize;

/// Health and readiness endpoint configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the probe endpoints are mounted.
    pub enabled: bool,
    /// Path of the liveness endpoint.
    pub path: Cow<'static, str>,
    /// Path of the readiness endpoint.
    pub readiness_path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            enabled: true,
            path: Cow::Borrowed("/health"),
            readiness_path: Cow::Borrowed("/readiness"),
        }
    }
}
