use telemetry::{
    Span,
    metrics::{ACTIVE_REQUESTS, CHAT_REQUESTS_TOTAL, ERRORS_TOTAL},
    summary::{ErrorLogEntry, MessageMetrics},
    tracing::{RequestTrace, TraceOutcome},
};
use tokio::time::Instant;

use super::{RequestContext, RequestOutcome, StreamRelay};
use crate::error::{RelayError, RelayStatus};

/// Status code logged for clients that went away before an answer.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Accumulates the measurements of one run and folds them into the sinks
/// exactly once.
pub(super) struct InFlight<'a> {
    relay: &'a StreamRelay,
    context: RequestContext,
    input_length: usize,
    trace: Option<RequestTrace>,
    pub(super) start: Instant,
    first_token: Option<Instant>,
    pub(super) tokens_in: u64,
    pub(super) tokens_out: u64,
    pub(super) upstream_contacted: bool,
    finished: bool,
}

impl<'a> InFlight<'a> {
    pub(super) fn start(relay: &'a StreamRelay, context: RequestContext, input_length: usize) -> Self {
        relay.metrics.add_gauge(ACTIVE_REQUESTS, &[], 1.0);

        let trace = RequestTrace::start(context.trace_parent);

        Self {
            relay,
            context,
            input_length,
            trace: Some(trace),
            start: Instant::now(),
            first_token: None,
            tokens_in: 0,
            tokens_out: 0,
            upstream_contacted: false,
            finished: false,
        }
    }

    pub(super) fn phase(&self, name: &'static str) -> Span {
        match &self.trace {
            Some(trace) => trace.phase(name),
            None => Span::noop(),
        }
    }

    /// Stamps the first token. Returns true only the first time.
    pub(super) fn mark_first_token(&mut self) -> bool {
        if self.first_token.is_some() {
            return false;
        }

        let now = Instant::now();
        self.first_token = Some(now);

        if let Some(trace) = &self.trace {
            trace.first_token(now.saturating_duration_since(self.start));
        }

        true
    }

    pub(super) fn finish(mut self, result: Result<(), RelayError>) -> RequestOutcome {
        self.finalize(result)
    }

    fn finalize(&mut self, result: Result<(), RelayError>) -> RequestOutcome {
        self.finished = true;

        let relay = self.relay;
        let model = relay.model.model.as_str();
        let duration = self.start.elapsed();
        let time_to_first_token = self.first_token.map(|at| at.saturating_duration_since(self.start));

        let (status, error) = match result {
            Ok(()) => (RelayStatus::Completed, None),
            Err(error) => (error.status(), Some(error)),
        };

        let failure = error.as_ref().filter(|error| error.is_failure());

        if self.upstream_contacted {
            relay.metrics.record_inference(
                model,
                self.start,
                self.tokens_in,
                self.tokens_out,
                self.first_token,
            );
        }

        relay
            .metrics
            .increment_counter(CHAT_REQUESTS_TOTAL, &[("model", model), ("status", status.label())]);

        if failure.is_some() {
            relay
                .metrics
                .increment_counter(ERRORS_TOTAL, &[("type", status.label()), ("operation", "chat")]);
        }

        match (status, failure) {
            (RelayStatus::Completed, _) => relay.summary.record_message(
                &self.context.client_key,
                MessageMetrics {
                    message_id: uuid::Uuid::new_v4().to_string(),
                    tokens_in: self.tokens_in,
                    tokens_out: self.tokens_out,
                    response_time_ms: duration.as_secs_f64() * 1000.0,
                    time_to_first_token_ms: time_to_first_token.map_or(0.0, |ttft| ttft.as_secs_f64() * 1000.0),
                },
            ),
            (_, Some(error)) => relay.summary.record_error(ErrorLogEntry {
                error_type: status.label().to_string(),
                status_code: error.status_code().map_or(CLIENT_CLOSED_REQUEST, |code| code.as_u16()),
                input_length: self.input_length as u64,
                timestamp: jiff::Timestamp::now().to_string(),
            }),
            _ => (),
        }

        relay.metrics.add_gauge(ACTIVE_REQUESTS, &[], -1.0);

        let message = failure.map(ToString::to_string);

        if let Some(trace) = self.trace.take() {
            trace.finish(&TraceOutcome {
                model,
                status: status.label(),
                tokens_in: self.tokens_in,
                tokens_out: self.tokens_out,
                duration,
                time_to_first_token,
                error: message.as_deref(),
            });
        }

        match &message {
            Some(message) => log::warn!(
                "Chat request for {} from {} ended with {}: {message}",
                model,
                self.context.client_key,
                status.label()
            ),
            None => log::debug!(
                "Chat request for {} from {} ended with {} after {:?}, {} tokens out",
                model,
                self.context.client_key,
                status.label(),
                duration,
                self.tokens_out
            ),
        }

        RequestOutcome {
            status,
            error,
            tokens_in: self.tokens_in,
            tokens_out: self.tokens_out,
            duration,
            time_to_first_token,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finalize(Err(RelayError::Cancelled));
        }
    }
}
