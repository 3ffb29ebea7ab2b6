use integration_tests::{MockUpstream, TestServer};
use reqwest::StatusCode;
use serde_json::json;

const ERRORS: &str = "genai_app_errors_total";

#[tokio::test]
async fn sixty_first_request_in_a_minute_is_rejected() {
    let upstream = MockUpstream::with_deltas(["ok"]).spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    for _ in 0..60 {
        let (status, body) = server.client.chat("Hi").await;

        assert_eq!(status, 200);
        assert_eq!(body, "ok");
    }

    let response = server.client.post("/chat", &json!({ "message": "Hi" })).await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.text().await.unwrap(), "Rate limit exceeded");
    assert_eq!(upstream.requests().len(), 60);

    let metrics = server.client.metrics().await;

    assert_eq!(metrics.value(ERRORS, &[("type", "rate_limit"), ("operation", "api")]), Some(1.0));
}

#[tokio::test]
async fn configured_limit_applies() {
    let upstream = MockUpstream::with_deltas(["ok"]).spawn().await;

    let server = TestServer::with_upstream(
        &upstream,
        indoc::indoc! {r#"
            [server.rate_limits]
            limit = 2
            interval = "1m"
        "#},
    )
    .await;

    assert_eq!(server.client.chat("one").await.0, 200);
    assert_eq!(server.client.chat("two").await.0, 200);
    assert_eq!(server.client.chat("three").await.0, 429);
}

#[tokio::test]
async fn other_routes_do_not_consume_the_budget() {
    let upstream = MockUpstream::with_deltas(["ok"]).spawn().await;

    let server = TestServer::with_upstream(
        &upstream,
        indoc::indoc! {r#"
            [server.rate_limits]
            limit = 1
        "#},
    )
    .await;

    for _ in 0..5 {
        assert_eq!(server.client.get("/metrics/summary").await.status(), StatusCode::OK);
        assert_eq!(server.client.get("/health").await.status(), StatusCode::OK);
    }

    assert_eq!(server.client.chat("Hi").await.0, 200);
    assert_eq!(server.client.chat("Hi").await.0, 429);
}

#[tokio::test]
async fn disabled_rate_limiting_admits_everything() {
    let upstream = MockUpstream::with_deltas(["ok"]).spawn().await;

    let server = TestServer::with_upstream(
        &upstream,
        indoc::indoc! {r#"
            [server.rate_limits]
            enabled = false
            limit = 1
        "#},
    )
    .await;

    for _ in 0..5 {
        assert_eq!(server.client.chat("Hi").await.0, 200);
    }
}
