use std::{borrow::Cow, fmt, io::IsTerminal, net::SocketAddr, path::PathBuf, str::FromStr};

use clap::{Parser, ValueEnum};
use config::Config;
use logforth::filter::EnvFilter;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "GenAI Relay", version, long_about = concat!("GenAI Relay v", env!("CARGO_PKG_VERSION")))]
pub struct Args {
    /// IP address on which the server will listen for incoming connections.
    /// Default: 0.0.0.0:8080
    #[arg(short, long, env = "RELAY_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,
    /// Path to the TOML configuration file
    #[arg(long, short, env = "RELAY_CONFIG_PATH", default_value = "./relay.toml")]
    pub config: PathBuf,
    /// Base URL of the OpenAI-compatible model API, overrides `llm.base_url`
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<Url>,
    /// Model to request completions from, overrides `llm.model`
    #[arg(long, env = "MODEL")]
    pub model: Option<String>,
    /// Set the logging level, this applies to all spans, logs and trace events.
    #[arg(long = "log", env = "RELAY_LOG", default_value_t = LogLevel::default())]
    pub log_level: LogLevel,
    /// Set the style of log output
    #[arg(long, env = "RELAY_LOG_STYLE", default_value_t = LogStyle::default())]
    pub log_style: LogStyle,
}

impl Args {
    /// Loads the configuration file if it exists and applies the overrides
    /// from the command line and environment.
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = if self.config.exists() {
            Config::load(&self.config)?
        } else {
            Config::default()
        };

        if let Some(base_url) = &self.base_url {
            config.llm.base_url = base_url.clone();
        }

        if let Some(model) = self.model.as_deref().filter(|model| !model.is_empty()) {
            config.llm.model = model.to_owned();
        }

        config.validate()?;

        Ok(config)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogStyle {
    /// Colorized text, used as the default with TTY output
    Color,
    /// Standard text, used as the default with non-TTY output
    Text,
    /// JSON objects
    Json,
}

impl Default for LogStyle {
    fn default() -> Self {
        if std::io::stdout().is_terminal() {
            LogStyle::Color
        } else {
            LogStyle::Text
        }
    }
}

impl fmt::Display for LogStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let style = match self {
            LogStyle::Color => "color",
            LogStyle::Text => "text",
            LogStyle::Json => "json",
        };

        f.write_str(style)
    }
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogLevel {
    /// Disable logging
    Off,
    /// Only log errors
    Error,
    /// Log errors, and warnings
    Warn,
    /// Log errors, warnings, and info messages
    #[default]
    Info,
    /// Log errors, warnings, info, and debug messages
    Debug,
    /// Log errors, warnings, info, debug, and trace messages
    Trace,
}

impl LogLevel {
    /// Dependencies log at `warn`; the workspace crates at the selected level.
    pub fn env_filter(self) -> EnvFilter {
        let filter = match self {
            LogLevel::Off => Cow::Borrowed("off"),
            level => Cow::Owned(format!(
                "warn,relay={level},server={level},llm={level},rate_limit={level},telemetry={level},config={level}"
            )),
        };

        EnvFilter::from_str(&filter).expect("These all are valid env filters.")
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        f.write_str(level)
    }
}
