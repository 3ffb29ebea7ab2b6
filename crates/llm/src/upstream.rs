//! Sources of completion tokens.

mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;

use crate::{error::UpstreamError, messages::Message};

pub use openai::OpenAiUpstream;

/// Lazy, finite stream of text deltas. Deltas may be empty; the stream ends
/// when the upstream signals completion.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

/// Body of a streaming chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Sends the request and returns the token stream once the upstream
    /// accepted it.
    async fn open(&self, request: &CompletionRequest) -> Result<TokenStream, UpstreamError>;
}
