//! An OpenAI-compatible model server that streams scripted deltas.

use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response, Sse, sse::Event},
    routing::post,
};
use futures::{Stream, StreamExt, stream};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;

#[derive(Clone)]
enum Script {
    Deltas(Vec<String>),
    Endless(String),
    Error { status: StatusCode, message: String },
}

/// Builder for the mock model server.
pub struct MockUpstream {
    script: Script,
    delay: Duration,
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::with_deltas(["Hello", "!", " How", " can", " I", " help?"])
    }
}

impl MockUpstream {
    /// Streams the given deltas in order, then `[DONE]`.
    pub fn with_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Script::Deltas(deltas.into_iter().map(Into::into).collect()),
            delay: Duration::ZERO,
        }
    }

    /// Streams `delta` until the client goes away.
    pub fn endless(delta: impl Into<String>) -> Self {
        Self {
            script: Script::Endless(delta.into()),
            delay: Duration::from_millis(10),
        }
    }

    /// Answers every completion request with an error status.
    pub fn failing(status: u16, message: impl Into<String>) -> Self {
        Self {
            script: Script::Error {
                status: StatusCode::from_u16(status).unwrap(),
                message: message.into(),
            },
            delay: Duration::ZERO,
        }
    }

    /// Waits this long before every event.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn spawn(self) -> MockUpstreamHandle {
        let state = Arc::new(MockState {
            script: self.script,
            delay: self.delay,
            requests: Mutex::new(Vec::new()),
            streams_closed: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockUpstreamHandle { address, state }
    }
}

struct MockState {
    script: Script,
    delay: Duration,
    requests: Mutex<Vec<Value>>,
    streams_closed: AtomicUsize,
}

/// A running mock model server.
pub struct MockUpstreamHandle {
    address: SocketAddr,
    state: Arc<MockState>,
}

impl MockUpstreamHandle {
    /// Value for `llm.base_url`.
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.address)
    }

    /// Bodies of all completion requests received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().clone()
    }

    /// How many response streams ended, either finished or dropped by the client.
    pub fn streams_closed(&self) -> usize {
        self.state.streams_closed.load(Ordering::SeqCst)
    }

    /// Waits until `count` response streams have ended.
    pub async fn wait_for_closed_streams(&self, count: usize) -> bool {
        let state = &self.state;
        crate::eventually(|| async move { state.streams_closed.load(Ordering::SeqCst) >= count }).await
    }
}

/// Counts the stream as closed when the response body is dropped.
struct CloseGuard(Arc<MockState>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.streams_closed.fetch_add(1, Ordering::SeqCst);
    }
}

async fn chat_completions(State(state): State<Arc<MockState>>, Json(request): Json<Value>) -> Response {
    state.requests.lock().push(request);

    let deltas: Box<dyn Iterator<Item = String> + Send> = match &state.script {
        Script::Error { status, message } => {
            return (*status, Json(json!({ "error": { "message": message } }))).into_response();
        }
        Script::Deltas(deltas) => Box::new(deltas.clone().into_iter()),
        Script::Endless(delta) => Box::new(std::iter::repeat(delta.clone())),
    };

    Sse::new(events(state, deltas)).into_response()
}

fn events(
    state: Arc<MockState>,
    deltas: Box<dyn Iterator<Item = String> + Send>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let delay = state.delay;
    let guard = CloseGuard(state);

    let role = stream::once(async { json!({ "choices": [{ "index": 0, "delta": { "role": "assistant" } }] }) });

    let content = stream::iter(deltas).then(move |delta| async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        json!({ "choices": [{ "index": 0, "delta": { "content": delta } }] })
    });

    role.chain(content)
        .map(|chunk| Event::default().data(chunk.to_string()))
        .chain(stream::once(async { Event::default().data("[DONE]") }))
        .map(move |event| {
            let _ = &guard;
            Ok(event)
        })
}
