use std::{fmt::Write, path::Path};

use anyhow::{Context, bail};
use indoc::formatdoc;
use serde::Deserialize;
use toml::Value;

use crate::Config;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;

    let mut raw_config: Value = toml::from_str(&content)?;
    expand_env_placeholders(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate(&config)?;

    Ok(config)
}

/// Rejects values that deserialize fine but cannot run, and logs the ones
/// that are merely suspicious.
pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    let rate_limits = &config.server.rate_limits;

    if rate_limits.enabled && rate_limits.limit == 0 {
        bail!(formatdoc! {r#"
            Rate limiting is enabled with a limit of zero, which would reject every chat request.

            Either raise the limit or disable rate limiting:

              [server.rate_limits]
              enabled = false
        "#});
    }

    if rate_limits.enabled && rate_limits.interval.is_zero() {
        bail!("server.rate_limits.interval must be longer than zero");
    }

    if rate_limits.enabled && rate_limits.sweep_interval.is_zero() {
        bail!("server.rate_limits.sweep_interval must be longer than zero");
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be between 0.0 and 2.0, got {}", config.llm.temperature);
    }

    if config.llm.max_tokens == 0 {
        bail!("llm.max_tokens must be at least 1");
    }

    let paths = [
        ("llm.path", config.llm.path.as_ref()),
        ("server.health.path", config.server.health.path.as_ref()),
        ("server.health.readiness_path", config.server.health.readiness_path.as_ref()),
        ("telemetry.metrics.path", config.telemetry.metrics().path.as_ref()),
    ];

    for (name, path) in paths {
        if !path.starts_with('/') {
            bail!("{name} must start with a slash, got '{path}'");
        }
    }

    if config.telemetry.metrics().listen.is_none() && config.telemetry.metrics().path == config.llm.path {
        bail!("telemetry.metrics.path and llm.path cannot both be '{}'", config.llm.path);
    }

    let timeouts = &config.server.timeouts;

    if timeouts.first_byte > timeouts.total {
        log::warn!(
            "server.timeouts.first_byte ({:?}) is longer than server.timeouts.total ({:?}), the total deadline wins",
            timeouts.first_byte,
            timeouts.total
        );
    }

    if !config.server.rate_limits.enabled {
        log::warn!("Rate limiting is disabled, every client may open an unbounded number of streams");
    }

    Ok(())
}

/// Replaces `{{ env.NAME }}` in string values with the content of the
/// environment variable `NAME`.
fn expand_env_placeholders<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => {
            if let Some(expanded) = expand_string(s).map_err(|err| anyhow::anyhow!("{err} at path '{}'", render_path(path)))? {
                *s = expanded;
            }
        }
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_env_placeholders(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_env_placeholders(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

fn expand_string(input: &str) -> anyhow::Result<Option<String>> {
    if !input.contains("{{") {
        return Ok(None);
    }

    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);

        let Some(end) = rest[start..].find("}}") else {
            bail!("Unterminated placeholder in '{input}'");
        };

        let expression = rest[start + 2..start + end].trim();

        let Some(name) = expression.strip_prefix("env.") else {
            bail!("Unsupported placeholder '{{{{ {expression} }}}}', only env.NAME is available");
        };

        let value = std::env::var(name).with_context(|| format!("Environment variable {name} is not set"))?;
        output.push_str(&value);

        rest = &rest[start + end + 2..];
    }

    output.push_str(rest);

    Ok(Some(output))
}

fn render_path(path: &[Result<&str, usize>]) -> String {
    let mut rendered = String::new();

    for segment in path {
        match segment {
            Ok(key) => {
                if !rendered.is_empty() {
                    rendered.push('.');
                }
                rendered.push_str(key);
            }
            Err(index) => {
                let _ = write!(rendered, "[{index}]");
            }
        }
    }

    rendered
}
