//! Relay configuration structures to map the relay.toml configuration.

#![deny(missing_docs)]

mod cors;
mod health;
mod llm;
mod loader;
mod rate_limit;
mod server;
mod telemetry;

use std::path::Path;

pub use cors::*;
pub use health::HealthConfig;
pub use llm::{LlmConfig, ResponseFormat};
pub use rate_limit::RateLimitConfig;
pub use server::{DownstreamTimeouts, ServerConfig};
pub use telemetry::{
    MetricsConfig, TelemetryConfig, TracingConfig,
    exporters::{BatchExportConfig, ExportersConfig, OtlpExporterConfig, OtlpProtocol},
};

use serde::Deserialize;

/// Main configuration structure for the relay.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream chat-completion settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Telemetry configuration settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates the values that serde alone cannot check.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use indoc::indoc;

    use crate::{
        Config, ResponseFormat,
        cors::{AnyOrAsciiStringArray, AnyOrHttpMethodArray, AnyOrUrlArray, HttpMethod},
    };

    #[test]
    fn server_defaults() {
        let config: Config = toml::from_str("").unwrap();

        insta::assert_debug_snapshot!(&config.server, @r#"
        ServerConfig {
            listen_address: None,
            health: HealthConfig {
                enabled: true,
                path: "/health",
                readiness_path: "/readiness",
            },
            cors: None,
            rate_limits: RateLimitConfig {
                enabled: true,
                limit: 60,
                interval: 60s,
                sweep_interval: 60s,
            },
            timeouts: DownstreamTimeouts {
                first_byte: 30s,
                total: 90s,
            },
        }
        "#);
    }

    #[test]
    fn server_all_values() {
        let config = indoc! {r#"
            [server]
            listen_address = "127.0.0.1:8080"

            [server.health]
            enabled = false
            path = "/healthz"
            readiness_path = "/readyz"

            [server.rate_limits]
            enabled = true
            limit = 10
            interval = "30s"
            sweep_interval = "5m"

            [server.timeouts]
            first_byte = "10s"
            total = "2m"
        "#};

        let config: Config = toml::from_str(config).unwrap();

        insta::assert_debug_snapshot!(&config.server, @r#"
        ServerConfig {
            listen_address: Some(
                127.0.0.1:8080,
            ),
            health: HealthConfig {
                enabled: false,
                path: "/healthz",
                readiness_path: "/readyz",
            },
            cors: None,
            rate_limits: RateLimitConfig {
                enabled: true,
                limit: 10,
                interval: 30s,
                sweep_interval: 300s,
            },
            timeouts: DownstreamTimeouts {
                first_byte: 10s,
                total: 120s,
            },
        }
        "#);
    }

    #[test]
    fn llm_defaults() {
        let config: Config = toml::from_str("").unwrap();
        let llm = config.llm;

        assert_eq!(llm.base_url.as_str(), "http://model-runner.docker.internal/engines/llama.cpp/v1");
        assert_eq!(llm.model, "ai/llama3.2:1B-Q8_0");
        assert_eq!(llm.temperature, 0.2);
        assert_eq!(llm.max_tokens, 500);
        assert_eq!(llm.path, "/chat");
        assert_eq!(llm.request_timeout, Duration::from_secs(120));
        assert!(llm.api_key.is_none());
        assert_eq!(llm.default_format, None);
    }

    #[test]
    fn llm_all_values() {
        let config = indoc! {r#"
            [llm]
            base_url = "http://model-runner:8080/v1"
            model = "ai/gemma3"
            temperature = 0.7
            max_tokens = 1024
            api_key = "sk-test"
            path = "/api/chat"
            request_timeout = "45s"
            default_format = "markdown"
        "#};

        let config: Config = toml::from_str(config).unwrap();
        let llm = config.llm;

        assert_eq!(llm.completions_url(), "http://model-runner:8080/v1/chat/completions");
        assert_eq!(llm.model, "ai/gemma3");
        assert_eq!(llm.temperature, 0.7);
        assert_eq!(llm.max_tokens, 1024);
        assert!(llm.api_key.is_some());
        assert_eq!(llm.path, "/api/chat");
        assert_eq!(llm.request_timeout, Duration::from_secs(45));
        assert_eq!(llm.default_format, Some(ResponseFormat::Markdown));
    }

    #[test]
    fn completions_url_trims_trailing_slash() {
        let config = indoc! {r#"
            [llm]
            base_url = "http://localhost:12434/engines/v1/"
        "#};

        let config: Config = toml::from_str(config).unwrap();

        assert_eq!(
            config.llm.completions_url(),
            "http://localhost:12434/engines/v1/chat/completions"
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let config = indoc! {r#"
            [llm]
            modle = "typo"
        "#};

        let error = toml::from_str::<Config>(config).unwrap_err();

        assert!(error.to_string().contains("unknown field `modle`"));
    }

    #[test]
    fn telemetry_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.telemetry.service_name(), None);
        assert!(config.telemetry.metrics_otlp_config().is_none());
        assert!(config.telemetry.traces_otlp_config().is_none());
        assert_eq!(config.telemetry.metrics().path, "/metrics");
        assert_eq!(config.telemetry.metrics().listen, None);
        assert!(config.telemetry.tracing().enabled);
    }

    #[test]
    fn telemetry_otlp_enabled() {
        let config = indoc! {r#"
            [telemetry]
            service_name = "genai-relay"

            [telemetry.resource_attributes]
            environment = "test"

            [telemetry.exporters.otlp]
            enabled = true
            endpoint = "http://collector:4318"
            protocol = "http"
            timeout = "5s"

            [telemetry.metrics]
            listen = "127.0.0.1:9090"
        "#};

        let config: Config = toml::from_str(config).unwrap();
        let otlp = config.telemetry.traces_otlp_config().unwrap();

        assert_eq!(config.telemetry.service_name(), Some("genai-relay"));
        assert_eq!(otlp.endpoint.as_str(), "http://collector:4318/");
        assert_eq!(otlp.protocol, crate::OtlpProtocol::Http);
        assert_eq!(otlp.timeout, Duration::from_secs(5));
        assert!(config.telemetry.metrics_otlp_config().is_some());
        assert_eq!(
            config.telemetry.resource_attributes().get("environment").map(String::as_str),
            Some("test")
        );
        assert_eq!(config.telemetry.metrics().listen, Some("127.0.0.1:9090".parse().unwrap()));
    }

    #[test]
    fn batch_export_delay() {
        let config = indoc! {r#"
            [telemetry.exporters.otlp]
            enabled = true

            [telemetry.exporters.otlp.batch_export]
            scheduled_delay = "2s"
        "#};

        let config: Config = toml::from_str(config).unwrap();
        let otlp = config.telemetry.traces_otlp_config().unwrap();

        assert_eq!(otlp.batch_export.scheduled_delay, Duration::from_secs(2));
    }

    #[test]
    fn batch_export_queue_settings_are_rejected() {
        let config = indoc! {r#"
            [telemetry.exporters.otlp.batch_export]
            max_queue_size = 4096
        "#};

        let error = toml::from_str::<Config>(config).unwrap_err();

        assert!(error.to_string().contains("unknown field `max_queue_size`"), "{error}");
    }

    #[test]
    fn tracing_disabled_hides_exporter() {
        let config = indoc! {r#"
            [telemetry.exporters.otlp]
            enabled = true

            [telemetry.tracing]
            enabled = false
        "#};

        let config: Config = toml::from_str(config).unwrap();

        assert!(config.telemetry.traces_otlp_config().is_none());
        assert!(config.telemetry.metrics_otlp_config().is_some());
    }

    #[test]
    fn cors_allow_origins_any() {
        let input = indoc! {r#"
            [server.cors]
            allow_origins = "*"
        "#};

        let config: Config = toml::from_str(input).unwrap();
        let cors = config.server.cors.unwrap();

        assert_eq!(Some(AnyOrUrlArray::Any), cors.allow_origins)
    }

    #[test]
    fn cors_allow_origins_explicit() {
        let input = indoc! {r#"
            [server.cors]
            allow_origins = ["http://localhost:3000"]
        "#};

        let config: Config = toml::from_str(input).unwrap();
        let cors = config.server.cors.unwrap();
        let expected = AnyOrUrlArray::Explicit(vec!["http://localhost:3000".parse().unwrap()]);

        assert_eq!(Some(expected), cors.allow_origins)
    }

    #[test]
    fn cors_allow_origins_invalid_url() {
        let input = indoc! {r#"
            [server.cors]
            allow_origins = ["foo"]
        "#};

        let error = toml::from_str::<Config>(input).unwrap_err();

        assert!(error.to_string().contains("relative URL without a base"));
    }

    #[test]
    fn cors_allow_methods_explicit() {
        let input = indoc! {r#"
            [server.cors]
            allow_methods = ["POST", "GET"]
        "#};

        let config: Config = toml::from_str(input).unwrap();
        let cors = config.server.cors.unwrap();
        let expected = AnyOrHttpMethodArray::Explicit(vec![HttpMethod::Post, HttpMethod::Get]);

        assert_eq!(Some(expected), cors.allow_methods)
    }

    #[test]
    fn cors_allow_headers_any() {
        let input = indoc! {r#"
            [server.cors]
            allow_headers = "*"
            max_age = "60s"
        "#};

        let config: Config = toml::from_str(input).unwrap();
        let cors = config.server.cors.unwrap();

        assert_eq!(Some(AnyOrAsciiStringArray::Any), cors.allow_headers);
        assert_eq!(Some(Duration::from_secs(60)), cors.max_age);
    }
}
