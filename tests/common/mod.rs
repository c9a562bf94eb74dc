//! Mock HTTP server setup for integration tests

#![allow(dead_code)]

use ai_facade::{AiClient, FacadeConfig, ModelConfig, Provider};
use mockito::{Matcher, Mock, Server, ServerGuard};

pub const TEST_KEY: &str = "test-key";

/// Test fixture that owns a mock server and points adapters at it
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Instance config aimed at the mock server, with an explicit key
    pub fn config(&self) -> ModelConfig {
        ModelConfig::new()
            .base_url(self.base_url.clone())
            .api_key(TEST_KEY)
    }

    /// Client with `config` for `provider`; no config file is read
    pub async fn client(&self, provider: Provider, config: ModelConfig) -> AiClient {
        AiClient::builder()
            .config(FacadeConfig::default())
            .provider_config(provider, config)
            .build()
            .await
            .expect("client builds")
    }

    /// Mock a JSON response for `POST {path}` (path is a prefix regex, any query)
    pub async fn mock_json(&mut self, path: &str, status: usize, body: &str) -> Mock {
        self.server
            .mock("POST", Matcher::Regex(format!("^{}", regex::escape(path))))
            .match_query(Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Mock an SSE body built from `data` payloads
    pub async fn mock_sse(&mut self, path: &str, frames: &[&str]) -> Mock {
        let body: String = frames.iter().map(|f| format!("data: {}\n\n", f)).collect();
        self.server
            .mock("POST", Matcher::Regex(format!("^{}", regex::escape(path))))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await
    }

    /// Mock an NDJSON body, one JSON object per line
    pub async fn mock_ndjson(&mut self, path: &str, lines: &[&str]) -> Mock {
        let body: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        self.server
            .mock("POST", Matcher::Regex(format!("^{}", regex::escape(path))))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/x-ndjson")
            .with_body(body)
            .create_async()
            .await
    }
}
