use integration_tests::{MockUpstream, TestServer};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn health_and_readiness_are_served_by_default() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server.client.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>().await.unwrap(), json!({ "status": "healthy" }));

    let response = server.client.get("/readiness").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>().await.unwrap(), json!({ "status": "ready" }));

    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn health_paths_are_configurable() {
    let upstream = MockUpstream::default().spawn().await;

    let server = TestServer::with_upstream(
        &upstream,
        indoc::indoc! {r#"
            [server.health]
            path = "/healthz"
            readiness_path = "/readyz"
        "#},
    )
    .await;

    assert_eq!(server.client.get("/healthz").await.status(), StatusCode::OK);
    assert_eq!(server.client.get("/readyz").await.status(), StatusCode::OK);
    assert_eq!(server.client.get("/health").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disabled_health_routes_are_absent() {
    let upstream = MockUpstream::default().spawn().await;

    let server = TestServer::with_upstream(
        &upstream,
        indoc::indoc! {r#"
            [server.health]
            enabled = false
        "#},
    )
    .await;

    assert_eq!(server.client.get("/health").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.client.get("/readiness").await.status(), StatusCode::NOT_FOUND);
}
