//! Metrics endpoints: the Prometheus exposition, the summary view and the
//! ingestion routes the browser client reports its own measurements to.

use std::{net::SocketAddr, sync::Arc};

use anyhow::anyhow;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use http::{StatusCode, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use telemetry::{
    metrics::{CHAT_TOKENS_TOTAL, ERRORS_TOTAL, FIRST_TOKEN_LATENCY, MODEL_LATENCY, MetricsSink, PrometheusSink},
    summary::{ErrorLogEntry, MessageMetrics, MetricsSummary, SummaryStore},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::{method_fallback, rate_limit::ClientKey};

/// Model label for measurements reported by the browser.
const CLIENT_MODEL: &str = "client";

#[derive(Clone)]
pub(crate) struct DashboardState {
    pub(crate) sink: Arc<dyn MetricsSink>,
    pub(crate) summary: Arc<SummaryStore>,
}

/// `/metrics/summary`, `/metrics/log` and `/metrics/error`.
pub(crate) fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/metrics/summary", get(summary).fallback(method_fallback))
        .route("/metrics/log", post(log_message).fallback(method_fallback))
        .route("/metrics/error", post(log_error).fallback(method_fallback))
        .with_state(state)
}

/// The Prometheus exposition at `path`.
pub(crate) fn exposition_router(path: &str, registry: Arc<PrometheusSink>) -> Router {
    Router::new()
        .route(path, get(exposition).fallback(method_fallback))
        .with_state(registry)
}

/// Serves the exposition on its own listener until `shutdown` fires.
pub(crate) async fn bind_exposition(
    address: SocketAddr,
    path: String,
    registry: Arc<PrometheusSink>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|e| anyhow!("Failed to bind metrics endpoint to {address}: {e}"))?;

    log::info!("Metrics endpoint exposed at http://{address}{path}");

    axum::serve(listener, exposition_router(&path, registry))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| anyhow!("Failed to start HTTP server in the metrics endpoint: {e}"))
}

async fn exposition(State(registry): State<Arc<PrometheusSink>>) -> Response {
    match registry.render() {
        Ok(body) => ([(CONTENT_TYPE, registry.content_type())], body).into_response(),
        Err(e) => {
            log::error!("Failed to render metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

async fn summary(State(state): State<DashboardState>) -> Json<MetricsSummary> {
    Json(state.summary.summary())
}

async fn log_message(State(state): State<DashboardState>, client: ClientKey, body: Bytes) -> Response {
    let metrics: MessageMetrics = match parse(&body) {
        Ok(metrics) => metrics,
        Err(response) => return response,
    };

    let sink = &state.sink;

    sink.add_counter(
        CHAT_TOKENS_TOTAL,
        &[("direction", "input"), ("model", CLIENT_MODEL)],
        metrics.tokens_in as f64,
    );
    sink.add_counter(
        CHAT_TOKENS_TOTAL,
        &[("direction", "output"), ("model", CLIENT_MODEL)],
        metrics.tokens_out as f64,
    );
    sink.observe_histogram(
        MODEL_LATENCY,
        &[("model", CLIENT_MODEL), ("operation", "inference")],
        metrics.response_time_ms / 1000.0,
    );
    sink.observe_histogram(
        FIRST_TOKEN_LATENCY,
        &[("model", CLIENT_MODEL)],
        metrics.time_to_first_token_ms / 1000.0,
    );

    state.summary.record_message(&client.0, metrics);

    success()
}

async fn log_error(State(state): State<DashboardState>, body: Bytes) -> Response {
    let entry: ErrorLogEntry = match parse(&body) {
        Ok(entry) => entry,
        Err(response) => return response,
    };

    state
        .sink
        .increment_counter(ERRORS_TOTAL, &[("type", &entry.error_type), ("operation", "frontend")]);

    state.summary.record_error(entry);

    success()
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        log::debug!("Rejecting metrics payload: {e}");
        (StatusCode::BAD_REQUEST, "Invalid request body").into_response()
    })
}

fn success() -> Response {
    Json(serde_json::json!({ "success": true })).into_response()
}
