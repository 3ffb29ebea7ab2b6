//! Harness for running the relay against a mock model server.

mod exposition;
mod upstream;

use std::{net::SocketAddr, time::Duration};

use config::Config;
use indoc::formatdoc;
use server::ServeConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

pub use exposition::Exposition;
pub use upstream::{MockUpstream, MockUpstreamHandle};

/// Test client for making HTTP requests to the test server
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given base URL
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Send a POST request with a JSON body
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Send a POST request with a raw body
    pub async fn post_raw(&self, path: &str, body: &str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    /// Starts a request with any method, for adding headers
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// Sends a chat message and returns the status and full body
    pub async fn chat(&self, message: &str) -> (u16, String) {
        let response = self.post("/chat", &serde_json::json!({ "message": message })).await;
        let status = response.status().as_u16();

        (status, response.text().await.unwrap())
    }

    /// Scrapes the metrics exposition
    pub async fn metrics(&self) -> Exposition {
        Exposition::new(self.get("/metrics").await.text().await.unwrap())
    }
}

/// A relay server bound to a random local port, shut down when dropped
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Start a new test server with the given TOML configuration
    pub async fn start(config_toml: &str) -> Self {
        let config: Config = toml::from_str(config_toml).unwrap();
        config.validate().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let shutdown = CancellationToken::new();

        let serve_config = ServeConfig {
            listen_address: address,
            config,
            shutdown: shutdown.clone(),
        };

        tokio::spawn(async move {
            if let Err(e) = server::serve(serve_config).await {
                eprintln!("Server failed to start: {e}");
            }
        });

        wait_for_listener(address).await;

        Self {
            client: TestClient::new(format!("http://{address}")),
            address,
            shutdown,
        }
    }

    /// Start a server relaying to `upstream`, with extra TOML appended
    pub async fn with_upstream(upstream: &MockUpstreamHandle, extra: &str) -> Self {
        let config = formatdoc! {r#"
            [llm]
            base_url = "{}"
            model = "test-model"
            request_timeout = "5s"

            {extra}
        "#, upstream.base_url()};

        Self::start(&config).await
    }

    /// Stops accepting connections and cancels in-flight relays
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Polls until something accepts connections on `address`.
pub async fn wait_for_listener(address: SocketAddr) {
    let listening = eventually(|| async move { TcpStream::connect(address).await.is_ok() }).await;
    assert!(listening, "nothing is listening on {address}");
}

/// Polls `check` for up to two seconds, returning whether it ever held.
///
/// Relays finish their bookkeeping on their own task, shortly after the
/// response body ends.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    false
}
