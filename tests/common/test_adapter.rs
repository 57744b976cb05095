//! # Adapter Test Infrastructure
//!
//! Starts a real adapter on an ephemeral loopback port and talks to it over
//! HTTP, the same way registration clients do.

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use pubsub_adapter::{AdapterConfig, Bridge, JsonRegistrationParser, Parser, PubSubAdapter};

/// A running adapter plus an HTTP client pointed at it
pub struct TestAdapter {
    pub adapter: PubSubAdapter,
    pub base_url: String,
    pub client: Client,
}

impl TestAdapter {
    /// Start with the JSON parser and no submit deadline
    pub async fn start() -> Self {
        Self::start_with(
            AdapterConfig::for_testing(),
            Arc::new(JsonRegistrationParser::new()),
        )
        .await
    }

    /// Start with an explicit configuration and parser
    pub async fn start_with(config: AdapterConfig, parser: Arc<dyn Parser>) -> Self {
        let adapter = PubSubAdapter::start_with_bridge(config, parser, Bridge::new())
            .await
            .expect("adapter should start on an ephemeral port");
        let base_url = format!("http://{}", adapter.local_addr());
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("client should build");

        Self {
            adapter,
            base_url,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A clone of the bridge for consumer tasks
    pub fn bridge(&self) -> Bridge {
        self.adapter.bridge().clone()
    }

    /// PUT a JSON body to `path`
    pub async fn put_json(&self, path: &str, body: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .put(self.url(path))
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
    }
}

/// Read status and body text from a response
pub async fn status_and_text(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let text = response.text().await.expect("response body should be text");
    (status, text)
}
