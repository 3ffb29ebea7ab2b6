//! The chat endpoint: admits a conversation, hands it to the relay on its own
//! task and streams the answer back as plain text.

use std::{convert::Infallible, sync::Arc};

use axum::{
    Extension,
    body::{Body, Bytes},
    extract::State,
    response::{IntoResponse, Response},
};
use futures::{StreamExt, stream};
use http::{
    StatusCode,
    header::{CACHE_CONTROL, CONTENT_TYPE},
};
use llm::{ChannelSink, ChatRequest, Conversation, RelayError, RequestContext, StreamRelay};
use telemetry::SpanContext;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::rate_limit::ClientKey;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[derive(Clone)]
pub(crate) struct ChatState {
    pub(crate) relay: Arc<StreamRelay>,
    /// Parent of every relay's cancellation token; fires on shutdown.
    pub(crate) shutdown: CancellationToken,
}

/// Relays one chat request.
///
/// The response starts once the first token is available. If the relay ends
/// before that, the client gets the error status instead. Once streaming has
/// begun, failures only end the body early. The body owns the receiving end
/// of the relay's one-slot channel, so a client that disconnects closes the
/// channel and stops the relay.
pub(crate) async fn chat(
    State(state): State<ChatState>,
    client: ClientKey,
    trace_parent: Option<Extension<SpanContext>>,
    body: Bytes,
) -> Response {
    let context = RequestContext {
        client_key: client.0,
        trace_parent: trace_parent.map(|Extension(parent)| parent),
    };

    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            log::debug!("Rejecting chat request body: {e}");
            let outcome = state.relay.reject(RelayError::InvalidRequest(e.to_string()), context);

            return error_response(outcome.error);
        }
    };

    let (sink, mut receiver) = ChannelSink::channel();
    let relay = state.relay.clone();
    let cancel = state.shutdown.child_token();

    let task = tokio::spawn(async move { relay.run(Conversation::from(request), sink, cancel, context).await });

    if let Some(first) = receiver.recv().await {
        let chunks = stream::once(async move { first })
            .chain(ReceiverStream::new(receiver))
            .map(Ok::<_, Infallible>);

        return (
            [(CONTENT_TYPE, TEXT_PLAIN), (CACHE_CONTROL, "no-cache")],
            Body::from_stream(chunks),
        )
            .into_response();
    }

    match task.await {
        Ok(outcome) => error_response(outcome.error),
        Err(e) => {
            log::error!("Chat relay task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// The answer for a relay that ended without writing anything: an empty
/// stream on success, the error status otherwise.
fn error_response(error: Option<RelayError>) -> Response {
    match error {
        None => ([(CONTENT_TYPE, TEXT_PLAIN)], Body::empty()).into_response(),
        Some(error) => error.into_response(),
    }
}
