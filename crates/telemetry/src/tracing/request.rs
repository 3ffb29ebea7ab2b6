use std::time::Duration;

use fastrace::{Event, Span, collector::SpanContext};

const ROOT_SPAN: &str = "chat_request";

/// Final annotations of a chat request span.
#[derive(Debug, Clone, Copy)]
pub struct TraceOutcome<'a> {
    /// Upstream model id.
    pub model: &'a str,
    /// Terminal status label.
    pub status: &'a str,
    /// Estimated prompt tokens.
    pub tokens_in: u64,
    /// Estimated answer tokens.
    pub tokens_out: u64,
    /// Time from start until the relay finished.
    pub duration: Duration,
    /// Time until the first token, if one arrived.
    pub time_to_first_token: Option<Duration>,
    /// Error description for failed requests.
    pub error: Option<&'a str>,
}

/// The span tree of one chat request.
///
/// Phases are children of the root. The root is annotated and closed by
/// [`RequestTrace::finish`]; a trace dropped without finishing closes with
/// status `cancelled`. Either way the root closes exactly once, after the
/// phase spans the caller dropped before.
pub struct RequestTrace {
    root: Span,
    finished: bool,
}

impl RequestTrace {
    /// Opens the root span, continuing `parent` when the request carried a trace.
    pub fn start(parent: Option<SpanContext>) -> Self {
        let parent = parent.unwrap_or_else(SpanContext::random);

        Self {
            root: Span::root(ROOT_SPAN, parent),
            finished: false,
        }
    }

    /// Opens a phase span under the root. The phase ends when the span is dropped.
    pub fn phase(&self, name: &'static str) -> Span {
        Span::enter_with_parent(name, &self.root)
    }

    /// Marks the arrival of the first token.
    pub fn first_token(&self, elapsed: Duration) {
        let millis = elapsed.as_millis().to_string();

        self.root
            .add_event(Event::new("first_token").with_property(|| ("time_to_first_token_ms", millis)));
    }

    /// Writes the outcome attributes and closes the root span.
    pub fn finish(mut self, outcome: &TraceOutcome<'_>) {
        let root = &self.root;

        root.add_property(|| ("model.name", outcome.model.to_string()));
        root.add_property(|| ("inference.type", "streaming"));
        root.add_property(|| ("request.status", outcome.status.to_string()));
        root.add_property(|| ("tokens.input", outcome.tokens_in.to_string()));
        root.add_property(|| ("tokens.output", outcome.tokens_out.to_string()));
        root.add_property(|| ("duration_sec", format!("{:.3}", outcome.duration.as_secs_f64())));

        if let Some(ttft) = outcome.time_to_first_token {
            root.add_property(|| ("time_to_first_token_ms", ttft.as_millis().to_string()));
        }

        if let Some(error) = outcome.error {
            root.add_property(|| ("error", "true"));
            root.add_property(|| ("error.type", outcome.status.to_string()));
            root.add_property(|| ("error.message", error.to_string()));
        }

        self.finished = true;
    }
}

impl Drop for RequestTrace {
    fn drop(&mut self) {
        if !self.finished {
            self.root.add_property(|| ("request.status", "cancelled"));
        }
    }
}
