use integration_tests::{MockUpstream, TestServer, eventually, wait_for_listener};
use reqwest::StatusCode;
use serde_json::json;
use tokio::net::TcpListener;

const CHAT_TOKENS: &str = "genai_app_chat_tokens_total";
const CHAT_REQUESTS: &str = "genai_app_chat_requests_total";
const HTTP_REQUESTS: &str = "genai_app_http_requests_total";
const ERRORS: &str = "genai_app_errors_total";

#[tokio::test]
async fn completed_chat_is_recorded() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let (status, _) = server.client.chat("Hello there, model").await;
    assert_eq!(status, 200);

    let client = &server.client;
    let recorded = eventually(|| async move {
        let metrics = client.metrics().await;

        metrics.value(CHAT_REQUESTS, &[("model", "test-model"), ("status", "completed")]) == Some(1.0)
    })
    .await;

    assert!(recorded);

    let metrics = server.client.metrics().await;

    assert_eq!(
        metrics.value(CHAT_TOKENS, &[("direction", "output"), ("model", "test-model")]),
        Some(6.0)
    );
    assert_eq!(
        metrics.value(CHAT_TOKENS, &[("direction", "input"), ("model", "test-model")]),
        Some(4.0)
    );
    assert_eq!(
        metrics.value(
            "genai_app_first_token_latency_seconds_count",
            &[("model", "test-model")]
        ),
        Some(1.0)
    );
    assert_eq!(
        metrics.value(
            "genai_app_model_latency_seconds_count",
            &[("model", "test-model"), ("operation", "inference")]
        ),
        Some(1.0)
    );
    assert_eq!(
        metrics.value(HTTP_REQUESTS, &[("method", "POST"), ("endpoint", "/chat"), ("status", "200")]),
        Some(1.0)
    );
    assert_eq!(metrics.value("genai_app_active_requests", &[]), Some(0.0));
}

#[tokio::test]
async fn metrics_endpoint_is_not_counted() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    server.client.get("/metrics").await;
    server.client.get("/metrics").await;

    let metrics = server.client.metrics().await;

    assert!(!metrics.text().contains("endpoint=\"/metrics\""), "{}", metrics.text());
}

#[tokio::test]
async fn exposition_can_move_to_its_own_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let metrics_address = listener.local_addr().unwrap();
    drop(listener);

    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(
        &upstream,
        &format!("[telemetry.metrics]\nlisten = \"{metrics_address}\"\npath = \"/prometheus\"\n"),
    )
    .await;

    wait_for_listener(metrics_address).await;

    assert_eq!(server.client.get("/metrics").await.status(), StatusCode::NOT_FOUND);

    let (status, _) = server.client.chat("Hi").await;
    assert_eq!(status, 200);

    let response = reqwest::get(format!("http://{metrics_address}/prometheus")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains(HTTP_REQUESTS));
}

#[tokio::test]
async fn summary_reflects_relayed_messages() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let (status, _) = server.client.chat("Hi").await;
    assert_eq!(status, 200);

    let client = &server.client;
    let summarized = eventually(|| async move {
        let summary: serde_json::Value = client.get("/metrics/summary").await.json().await.unwrap();
        summary["totalRequests"] == 1
    })
    .await;

    assert!(summarized);

    let summary: serde_json::Value = server.client.get("/metrics/summary").await.json().await.unwrap();

    assert_eq!(summary["tokensGenerated"], 6);
    assert_eq!(summary["activeUsers"], 1);
    assert_eq!(summary["errorRate"], 0.0);
}

#[tokio::test]
async fn client_measurements_are_accepted() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let body = json!({
        "message_id": "msg-1",
        "tokens_in": 12,
        "tokens_out": 40,
        "response_time_ms": 850.0,
        "time_to_first_token_ms": 120.0
    });

    let response = server.client.post("/metrics/log", &body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>().await.unwrap(), json!({ "success": true }));

    let metrics = server.client.metrics().await;

    assert_eq!(
        metrics.value(CHAT_TOKENS, &[("direction", "output"), ("model", "client")]),
        Some(40.0)
    );

    let summary: serde_json::Value = server.client.get("/metrics/summary").await.json().await.unwrap();

    assert_eq!(summary["totalRequests"], 1);
    assert_eq!(summary["tokensGenerated"], 40);
}

#[tokio::test]
async fn client_errors_are_counted() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let body = json!({
        "error_type": "network",
        "status_code": 0,
        "input_length": 42,
        "timestamp": "2026-01-01T00:00:00Z"
    });

    let response = server.client.post("/metrics/error", &body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let metrics = server.client.metrics().await;

    assert_eq!(
        metrics.value(ERRORS, &[("type", "network"), ("operation", "frontend")]),
        Some(1.0)
    );
}

#[tokio::test]
async fn malformed_measurements_are_rejected() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server.client.post_raw("/metrics/log", "[1, 2").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap(), "Invalid request body");
}
