//! Relay server library.
//!
//! Provides a reusable server function to serve the relay either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod chat;
mod cors;
mod dashboard;
mod health;
mod metrics;
mod rate_limit;
mod tracing;

use std::{net::SocketAddr, sync::Arc};

use ::rate_limit::RateLimitManager;
use anyhow::anyhow;
use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use config::Config;
use http::{Method, StatusCode};
use llm::{ModelConfig, OpenAiUpstream, StreamRelay};
use telemetry::{
    metrics::{FanoutSink, MetricsSink, OtelSink, PrometheusSink},
    summary::SummaryStore,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use self::{
    chat::ChatState,
    dashboard::DashboardState,
    metrics::MetricsLayer,
    rate_limit::RateLimitLayer,
    tracing::TracingLayer,
};

/// Configuration for serving the relay.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized relay TOML configuration.
    pub config: Config,
    /// Cancelling this token stops accepting connections and cancels every
    /// in-flight relay.
    pub shutdown: CancellationToken,
}

/// Starts and runs the relay server with the provided configuration.
pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        shutdown,
    }: ServeConfig,
) -> anyhow::Result<()> {
    let registry = Arc::new(PrometheusSink::new());
    let sink: Arc<dyn MetricsSink> = Arc::new(FanoutSink::new(vec![registry.clone(), Arc::new(OtelSink::new())]));
    let summary = Arc::new(SummaryStore::new());

    let upstream = OpenAiUpstream::new(&config.llm).map_err(|e| anyhow!("Failed to initialize the model upstream: {e}"))?;

    let relay = StreamRelay::new(
        Arc::new(upstream),
        ModelConfig::from(&config.llm),
        sink.clone(),
        summary.clone(),
        config.server.timeouts,
    );

    let rate_limits = Arc::new(RateLimitManager::new(&config.server.rate_limits, sink.clone()));

    if rate_limits.is_enabled() {
        tokio::spawn(sweep_rate_limits(
            rate_limits.clone(),
            config.server.rate_limits.sweep_interval,
            shutdown.clone(),
        ));
    }

    let chat_state = ChatState {
        relay: Arc::new(relay),
        shutdown: shutdown.clone(),
    };

    let chat_router = Router::new()
        .route(&config.llm.path, post(chat::chat).fallback(method_fallback))
        .with_state(chat_state)
        .layer(RateLimitLayer::new(rate_limits));

    let mut app = Router::new().merge(chat_router).merge(dashboard::router(DashboardState {
        sink: sink.clone(),
        summary,
    }));

    let metrics_config = config.telemetry.metrics();

    match metrics_config.listen {
        Some(address) => {
            tokio::spawn(dashboard::bind_exposition(
                address,
                metrics_config.path.to_string(),
                registry,
                shutdown.clone(),
            ));
        }
        None => app = app.merge(dashboard::exposition_router(&metrics_config.path, registry)),
    }

    if config.server.health.enabled {
        let health = &config.server.health;

        app = app
            .route(&health.path, get(health::health).fallback(method_fallback))
            .route(&health.readiness_path, get(health::readiness).fallback(method_fallback));
    }

    let app = app
        .layer(MetricsLayer::new(sink, &metrics_config.path))
        .layer(TracingLayer::new(config.telemetry.tracing().trace_context))
        .layer(cors::layer(config.server.cors.as_ref()));

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    log::info!("Chat endpoint available at: http://{listen_address}{}", config.llm.path);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;

    Ok(())
}

/// Answers `OPTIONS` on every route, and `405` for methods a route does not
/// serve.
async fn method_fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response()
    }
}

async fn sweep_rate_limits(manager: Arc<RateLimitManager>, every: std::time::Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                manager.sweep();
            }
        }
    }
}
