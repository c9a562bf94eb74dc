use crate::facade::provider::Provider;
use crate::{BoxStream, Error, ErrorContext, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::multipart::Form;
use reqwest::{Proxy, RequestBuilder, Response};
use serde_json::Value;
use std::env;
use std::time::Duration;

/// Correlation header attached to every outbound request.
pub const REQUEST_ID_HEADER: &str = "x-ai-facade-request-id";

/// How a request authenticates against its backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestAuth {
    None,
    Bearer(String),
    Header { name: &'static str, value: String },
}

impl RequestAuth {
    /// Bearer auth when a key is present, otherwise none.
    pub fn bearer(key: Option<&str>) -> Self {
        match key {
            Some(k) => RequestAuth::Bearer(k.to_string()),
            None => RequestAuth::None,
        }
    }
}

/// Thin wrapper over a pooled `reqwest::Client`.
///
/// Holds no per-call state; one instance is shared by every adapter a client creates.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(
                env::var("AI_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("AI_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )));

        // No default timeout: only applied when explicitly configured.
        if let Some(secs) = env::var("AI_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        if let Ok(proxy_url) = env::var("AI_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client })
    }

    /// Wrap an existing client (custom TLS, proxies, test setups).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn post(&self, url: &str, auth: &RequestAuth) -> RequestBuilder {
        let mut req = self
            .client
            .post(url)
            .header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string());
        match auth {
            RequestAuth::None => {}
            RequestAuth::Bearer(key) => req = req.bearer_auth(key),
            RequestAuth::Header { name, value } => req = req.header(*name, value),
        }
        req
    }

    /// Send and turn non-2xx statuses into [`Error::Remote`] with the body attached.
    async fn send(&self, provider: Provider, req: RequestBuilder) -> Result<Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(
                provider = provider.id(),
                http_status = status,
                "ai-facade request rejected"
            );
            return Err(Error::remote(provider, status, body));
        }
        Ok(resp)
    }

    /// Read a body as JSON; a non-JSON body becomes a JSON string.
    async fn read_json(resp: Response) -> Result<Value> {
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    pub async fn post_json(
        &self,
        provider: Provider,
        url: &str,
        auth: &RequestAuth,
        body: &Value,
    ) -> Result<Value> {
        let resp = self.send(provider, self.post(url, auth).json(body)).await?;
        Self::read_json(resp).await
    }

    pub async fn post_multipart(
        &self,
        provider: Provider,
        url: &str,
        auth: &RequestAuth,
        form: Form,
    ) -> Result<Value> {
        let resp = self
            .send(provider, self.post(url, auth).multipart(form))
            .await?;
        Self::read_json(resp).await
    }

    /// POST and return the raw body as a byte stream.
    ///
    /// Dropping the stream drops the response and closes the connection.
    pub async fn post_stream(
        &self,
        provider: Provider,
        url: &str,
        auth: &RequestAuth,
        body: &Value,
    ) -> Result<BoxStream<'static, Bytes>> {
        let resp = self
            .send(
                provider,
                self.post(url, auth)
                    .header("accept", "text/event-stream, application/x-ndjson")
                    .json(body),
            )
            .await?;

        let byte_stream = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        Ok(Box::pin(byte_stream))
    }

    /// GET a resource's bytes (image downloads).
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::runtime_with_context(
                format!("HTTP {} while fetching {}", status.as_u16(), url),
                ErrorContext::new().with_source("http_transport"),
            ));
        }
        resp.bytes()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
