use integration_tests::{MockUpstream, TestServer};
use reqwest::{Method, StatusCode};

async fn preflight(server: &TestServer, origin: &str) -> reqwest::Response {
    server
        .client
        .request(Method::OPTIONS, "/chat")
        .header("Origin", origin)
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn default_policy_allows_any_origin() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let response = preflight(&server, "https://chat.example.com").await;

    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();

    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-max-age"], "3600");

    let methods = headers["access-control-allow-methods"].to_str().unwrap();

    assert!(methods.contains("POST"), "{methods}");
    assert!(methods.contains("OPTIONS"), "{methods}");
    assert_eq!(headers["access-control-allow-headers"], "content-type");
}

#[tokio::test]
async fn simple_requests_carry_the_allow_origin_header() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server
        .client
        .request(Method::GET, "/health")
        .header("Origin", "https://chat.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn explicit_origins_are_enforced() {
    let upstream = MockUpstream::default().spawn().await;

    let server = TestServer::with_upstream(
        &upstream,
        indoc::indoc! {r#"
            [server.cors]
            allow_origins = ["http://localhost:3000"]
            allow_methods = ["POST"]
            allow_headers = ["content-type"]
        "#},
    )
    .await;

    let allowed = preflight(&server, "http://localhost:3000").await;

    assert_eq!(allowed.headers()["access-control-allow-origin"], "http://localhost:3000");

    let denied = preflight(&server, "https://elsewhere.example.com").await;

    assert!(denied.headers().get("access-control-allow-origin").is_none());
}
