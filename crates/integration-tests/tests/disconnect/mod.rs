use std::time::Duration;

use futures::StreamExt;
use integration_tests::{MockUpstream, TestServer, eventually};
use reqwest::StatusCode;
use serde_json::json;

const CHAT_REQUESTS: &str = "genai_app_chat_requests_total";
const ACTIVE: &str = "genai_app_active_requests";

#[tokio::test]
async fn client_disconnect_stops_the_upstream_stream() {
    let upstream = MockUpstream::endless("token ").spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server.client.post("/chat", &json!({ "message": "Tell me everything" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.bytes_stream();

    for _ in 0..3 {
        let chunk = body.next().await.unwrap().unwrap();
        assert!(!chunk.is_empty());
    }

    drop(body);

    let closed = upstream.wait_for_closed_streams(1).await;
    assert!(closed, "the upstream stream outlived the client");

    let client = &server.client;
    let recorded = eventually(|| async move {
        let metrics = client.metrics().await;

        metrics.value(CHAT_REQUESTS, &[("model", "test-model"), ("status", "downstream_write_failed")]) == Some(1.0)
            && metrics.value(ACTIVE, &[]) == Some(0.0)
    })
    .await;

    assert!(recorded, "{}", server.client.metrics().await.text());
}

#[tokio::test]
async fn shutdown_ends_streams_in_flight() {
    let upstream = MockUpstream::endless("token ").spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server.client.post("/chat", &json!({ "message": "Keep going" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.bytes_stream();
    body.next().await.unwrap().unwrap();

    server.shutdown();

    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = body.next().await {
            if chunk.is_err() {
                break;
            }
        }
    })
    .await;

    assert!(drained.is_ok(), "the body kept streaming after shutdown");

    let closed = upstream.wait_for_closed_streams(1).await;
    assert!(closed);
}

#[tokio::test]
async fn slow_model_times_out_before_the_first_byte() {
    let upstream = MockUpstream::with_deltas(["late"])
        .delay(Duration::from_secs(3))
        .spawn()
        .await;

    let server = TestServer::with_upstream(
        &upstream,
        indoc::indoc! {r#"
            [server.timeouts]
            first_byte = "200ms"
            total = "1s"
        "#},
    )
    .await;

    let (status, body) = server.client.chat("Hi").await;

    assert_eq!(status, 504);
    assert_eq!(body, "Model did not respond in time");
}
