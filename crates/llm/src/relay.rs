//! Relaying one conversation from the upstream token stream to the client.

mod finalize;

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use config::{DownstreamTimeouts, LlmConfig, ResponseFormat};
use futures::StreamExt;
use telemetry::{SpanContext, metrics::MetricsSink, summary::SummaryStore};
use tokio::time::{Instant, Sleep, sleep_until};
use tokio_util::sync::CancellationToken;

use self::finalize::InFlight;
use crate::{
    error::{RelayError, RelayStatus},
    messages::Conversation,
    sink::DownstreamSink,
    tokens,
    upstream::{CompletionRequest, UpstreamSource},
};

/// Model parameters fixed for the lifetime of a relay.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub default_format: Option<ResponseFormat>,
}

impl From<&LlmConfig> for ModelConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            default_format: config.default_format,
        }
    }
}

/// Who asked, and the trace the request arrived with.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub client_key: String,
    pub trace_parent: Option<SpanContext>,
}

/// The result of one relay run.
#[derive(Debug)]
pub struct RequestOutcome {
    pub status: RelayStatus,
    pub error: Option<RelayError>,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub duration: Duration,
    pub time_to_first_token: Option<Duration>,
}

/// Streams completions for conversations and accounts for every run.
///
/// Each run writes tokens to its sink as they arrive and ends in exactly one
/// terminal status. Metrics, the summary store and the trace are updated
/// once per run, whichever way it ends, including when the run future is
/// dropped.
pub struct StreamRelay {
    upstream: Arc<dyn UpstreamSource>,
    model: ModelConfig,
    metrics: Arc<dyn MetricsSink>,
    summary: Arc<SummaryStore>,
    timeouts: DownstreamTimeouts,
}

impl StreamRelay {
    pub fn new(
        upstream: Arc<dyn UpstreamSource>,
        model: ModelConfig,
        metrics: Arc<dyn MetricsSink>,
        summary: Arc<SummaryStore>,
        timeouts: DownstreamTimeouts,
    ) -> Self {
        Self {
            upstream,
            model,
            metrics,
            summary,
            timeouts,
        }
    }

    pub fn model(&self) -> &str {
        &self.model.model
    }

    /// Relays `conversation` into `sink` until the upstream finishes, either
    /// side fails, a deadline passes or `cancel` fires.
    pub async fn run<S>(
        &self,
        conversation: Conversation,
        sink: S,
        cancel: CancellationToken,
        context: RequestContext,
    ) -> RequestOutcome
    where
        S: DownstreamSink,
    {
        let mut run = InFlight::start(self, context, conversation.input_length());
        let result = self.relay(&mut run, &conversation, &sink, &cancel).await;

        run.finish(result)
    }

    /// Accounts for a request refused before a conversation could be built.
    pub fn reject(&self, error: RelayError, context: RequestContext) -> RequestOutcome {
        InFlight::start(self, context, 0).finish(Err(error))
    }

    async fn relay<S>(
        &self,
        run: &mut InFlight<'_>,
        conversation: &Conversation,
        sink: &S,
        cancel: &CancellationToken,
    ) -> Result<(), RelayError>
    where
        S: DownstreamSink,
    {
        let messages = {
            let _span = run.phase("build_messages");
            conversation.normalize(self.model.default_format)
        };

        if messages.is_empty() {
            return Err(RelayError::InvalidRequest("no message to send".to_string()));
        }

        run.tokens_in = messages.iter().map(|message| tokens::estimate(&message.content)).sum();

        let request = CompletionRequest {
            model: self.model.model.clone(),
            messages,
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
            stream: true,
        };

        let deadlines = Deadlines::new(run.start, self.timeouts);

        let _inference = run.phase("model_inference");
        run.upstream_contacted = true;

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RelayError::Cancelled),
            _ = sink.closed() => return Err(RelayError::DownstreamClosed),
            _ = deadlines.sleep(false) => return Err(deadlines.exceeded(false)),
            result = self.upstream.open(&request) => result.map_err(RelayError::UpstreamUnavailable)?,
        };

        let mut _stream_relay = None;

        loop {
            let delivered = run.tokens_out > 0;

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                _ = sink.closed() => return Err(RelayError::DownstreamClosed),
                _ = deadlines.sleep(delivered) => return Err(deadlines.exceeded(delivered)),
                next = stream.next() => next,
            };

            let text = match next {
                None => return Ok(()),
                Some(Err(e)) => return Err(RelayError::Stream(e)),
                Some(Ok(text)) if text.is_empty() => continue,
                Some(Ok(text)) => text,
            };

            if run.mark_first_token() {
                _stream_relay = Some(run.phase("stream_relay"));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                _ = deadlines.sleep(delivered) => return Err(deadlines.exceeded(delivered)),
                result = sink.write(Bytes::from(text)) => result.map_err(|_| RelayError::DownstreamClosed)?,
            }

            run.tokens_out += 1;
        }
    }
}

/// Downstream deadlines of one run: the first byte must be sent within
/// `first_byte`, everything within `total`.
struct Deadlines {
    first_byte: Instant,
    total: Instant,
    timeouts: DownstreamTimeouts,
}

impl Deadlines {
    fn new(start: Instant, timeouts: DownstreamTimeouts) -> Self {
        Self {
            first_byte: start + timeouts.first_byte,
            total: start + timeouts.total,
            timeouts,
        }
    }

    fn current(&self, delivered: bool) -> (Instant, Duration) {
        if !delivered && self.first_byte < self.total {
            (self.first_byte, self.timeouts.first_byte)
        } else {
            (self.total, self.timeouts.total)
        }
    }

    fn sleep(&self, delivered: bool) -> Sleep {
        sleep_until(self.current(delivered).0)
    }

    fn exceeded(&self, delivered: bool) -> RelayError {
        RelayError::DeadlineExceeded(self.current(delivered).1)
    }
}
