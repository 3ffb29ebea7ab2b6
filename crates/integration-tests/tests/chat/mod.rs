use integration_tests::{MockUpstream, TestServer, eventually};
use reqwest::{Method, StatusCode};
use serde_json::json;

const CHAT_REQUESTS: &str = "genai_app_chat_requests_total";
const ERRORS: &str = "genai_app_errors_total";

#[tokio::test]
async fn streams_the_answer_as_plain_text() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server.client.post("/chat", &json!({ "message": "Hi" })).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(response.headers()["cache-control"], "no-cache");
    insta::assert_snapshot!(response.text().await.unwrap(), @"Hello! How can I help?");
}

#[tokio::test]
async fn upstream_receives_a_streaming_completion_request() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let (status, _) = server.client.chat("Hi").await;
    assert_eq!(status, 200);

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);

    let request = &requests[0];
    assert_eq!(request["model"], "test-model");
    assert_eq!(request["stream"], true);
    assert_eq!(request["max_tokens"], 500);
    assert!((request["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    assert_eq!(request["messages"], json!([{ "role": "user", "content": "Hi" }]));
}

#[tokio::test]
async fn history_is_forwarded_before_the_new_message() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let body = json!({
        "messages": [
            { "role": "user", "content": "What is Rust?" },
            { "role": "assistant", "content": "A systems language." },
            { "role": "tool", "content": "ignored" }
        ],
        "message": "Is it fast?"
    });

    let response = server.client.post("/chat", &body).await;
    assert_eq!(response.status(), StatusCode::OK);
    response.text().await.unwrap();

    let request = &upstream.requests()[0];

    assert_eq!(
        request["messages"],
        json!([
            { "role": "user", "content": "What is Rust?" },
            { "role": "assistant", "content": "A systems language." },
            { "role": "user", "content": "Is it fast?" }
        ])
    );
}

#[tokio::test]
async fn asking_for_markdown_adds_a_system_instruction() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let (status, _) = server.client.chat("Answer in Markdown please").await;
    assert_eq!(status, 200);

    let messages = upstream.requests()[0]["messages"].as_array().unwrap().clone();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"].as_str().unwrap().contains("Markdown"));
    assert_eq!(messages[1]["content"], "Answer in Markdown please");
}

#[tokio::test]
async fn plain_format_suppresses_the_instruction() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let body = json!({ "message": "Answer in markdown", "format": "plain" });
    let response = server.client.post("/chat", &body).await;
    response.text().await.unwrap();

    let messages = upstream.requests()[0]["messages"].as_array().unwrap().clone();

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn malformed_body_is_rejected_without_contacting_the_model() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server.client.post_raw("/chat", "{not json").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap(), "Invalid request body");
    assert!(upstream.requests().is_empty());

    let metrics = server.client.metrics().await;
    let labels = [("model", "test-model"), ("status", "invalid_request")];

    assert_eq!(metrics.value(CHAT_REQUESTS, &labels), Some(1.0));
}

#[tokio::test]
async fn empty_conversation_is_rejected() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server.client.post("/chat", &json!({ "message": "" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn failing_model_answers_bad_gateway() {
    let upstream = MockUpstream::failing(500, "model crashed").spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let (status, body) = server.client.chat("Hi").await;

    assert_eq!(status, 502);
    assert_eq!(body, "Error communicating with model");

    let client = &server.client;
    let recorded = eventually(|| async move {
        let metrics = client.metrics().await;

        metrics.value(CHAT_REQUESTS, &[("model", "test-model"), ("status", "upstream_unavailable")]) == Some(1.0)
            && metrics.value(ERRORS, &[("type", "upstream_unavailable"), ("operation", "chat")]) == Some(1.0)
    })
    .await;

    assert!(recorded, "{}", server.client.metrics().await.text());
}

#[tokio::test]
async fn unreachable_model_answers_bad_gateway() {
    let server = TestServer::start(indoc::indoc! {r#"
        [llm]
        base_url = "http://127.0.0.1:1/v1"
        model = "test-model"
        request_timeout = "2s"
    "#})
    .await;

    let (status, _) = server.client.chat("Hi").await;

    assert_eq!(status, 502);
}

#[tokio::test]
async fn other_methods_are_not_allowed() {
    let upstream = MockUpstream::default().spawn().await;
    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server.client.get("/chat").await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    insta::assert_snapshot!(response.text().await.unwrap(), @"Method not allowed");

    let response = server.client.request(Method::OPTIONS, "/chat").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn configured_path_is_served() {
    let upstream = MockUpstream::default().spawn().await;

    let config = format!(
        "[llm]\nbase_url = \"{}\"\nmodel = \"test-model\"\npath = \"/api/chat\"\n",
        upstream.base_url()
    );
    let server = TestServer::start(&config).await;

    let response = server.client.post("/api/chat", &json!({ "message": "Hi" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server.client.post("/chat", &json!({ "message": "Hi" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
