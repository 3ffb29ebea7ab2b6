//! Upstream chat-completion configuration.

use std::{borrow::Cow, time::Duration};

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://model-runner.docker.internal/engines/llama.cpp/v1";

/// Settings for the OpenAI-compatible inference backend and the chat route.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// Base URL of the inference API. `chat/completions` is appended.
    pub base_url: Url,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound of generated tokens per answer.
    pub max_tokens: u32,
    /// Optional bearer token for the upstream.
    pub api_key: Option<SecretString>,
    /// Path the chat endpoint is mounted on.
    pub path: Cow<'static, str>,
    /// Timeout of the whole upstream HTTP exchange.
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    /// Format applied when the request does not choose one.
    pub default_format: Option<ResponseFormat>,
}

impl LlmConfig {
    /// Full URL of the streaming completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.as_str().trim_end_matches('/'))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default URL should be valid"),
            model: String::from("ai/llama3.2:1B-Q8_0"),
            temperature: 0.2,
            max_tokens: 500,
            api_key: None,
            path: Cow::Borrowed("/chat"),
            request_timeout: Duration::from_secs(120),
            default_format: None,
        }
    }
}

/// Output format requested from the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Ask the model to answer in Markdown.
    Markdown,
    /// Leave the model's formatting alone.
    Plain,
}
