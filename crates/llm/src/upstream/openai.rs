use async_trait::async_trait;
use config::LlmConfig;
use eventsource_stream::Eventsource;
use futures::{StreamExt, future};
use reqwest::{Client, header::AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{CompletionRequest, TokenStream, UpstreamSource};
use crate::error::UpstreamError;

const DONE_MARKER: &str = "[DONE]";

/// Streams completions from an OpenAI-compatible endpoint over SSE.
pub struct OpenAiUpstream {
    client: Client,
    url: String,
    api_key: Option<SecretString>,
}

impl OpenAiUpstream {
    pub fn new(config: &LlmConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(config.request_timeout).build().map_err(|e| {
            log::error!("Failed to create HTTP client for the model upstream: {e}");
            UpstreamError::Connection(e.to_string())
        })?;

        Ok(Self {
            client,
            url: config.completions_url(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl UpstreamSource for OpenAiUpstream {
    async fn open(&self, request: &CompletionRequest) -> Result<TokenStream, UpstreamError> {
        let mut builder = self.client.post(&self.url).json(request);

        if let Some(key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| UpstreamError::Connection(format!("Failed to send streaming request to {}: {e}", self.url)))?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Model upstream error ({status}): {message}");

            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let deltas = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| future::ready(!matches!(event, Ok(event) if event.data == DONE_MARKER)))
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => parse_delta(&event.data).map(Ok),
                    Err(e) => Some(Err(UpstreamError::Stream(e.to_string()))),
                })
            });

        Ok(Box::pin(deltas))
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Extracts the text of one SSE data payload: `choices[0].delta.content`,
/// falling back to `choices[0].text`. Unparseable payloads are skipped.
fn parse_delta(data: &str) -> Option<String> {
    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            log::warn!("Failed to parse model stream chunk: {e}");
            return None;
        }
    };

    let choice = chunk.choices.into_iter().next()?;

    match choice.delta.and_then(|delta| delta.content) {
        Some(content) if !content.is_empty() => Some(content),
        _ => choice.text,
    }
}
