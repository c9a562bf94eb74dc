use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::client::builder::AiClientBuilder;
use crate::config::ModelConfig;
use crate::drivers::{create_model, LanguageModel};
use crate::facade::provider::Provider;
use crate::transport::HttpTransport;
use crate::types::{GenerateRequest, GenerateResponse};
use crate::{BoxStream, Result};

/// Dispatches normalized requests to one adapter per backend.
///
/// Adapters are built once with their instance defaults and share one
/// [`HttpTransport`]; the client itself is cheap to share behind an `Arc`.
pub struct AiClient {
    transport: Arc<HttpTransport>,
    /// Indexed by `Provider as usize`, in [`Provider::ALL`] order.
    models: [Box<dyn LanguageModel>; 6],
}

impl AiClient {
    /// Client with defaults from `AI_FACADE_CONFIG` (if set) and the environment.
    pub async fn new() -> Result<Self> {
        AiClientBuilder::new().build().await
    }

    pub fn builder() -> AiClientBuilder {
        AiClientBuilder::new()
    }

    pub(crate) fn from_configs(
        configs: HashMap<Provider, ModelConfig>,
        transport: Arc<HttpTransport>,
    ) -> Self {
        let models = Provider::ALL.map(|p| {
            let config = configs.get(&p).cloned().unwrap_or_default();
            create_model(p, config, Arc::clone(&transport))
        });
        Self { transport, models }
    }

    /// Adapter for `provider`.
    pub fn model(&self, provider: Provider) -> &dyn LanguageModel {
        self.models[provider as usize].as_ref()
    }

    /// Transport shared by every adapter.
    pub fn transport(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    /// Instance defaults the adapter for `provider` was built with.
    pub fn config(&self, provider: Provider) -> &ModelConfig {
        self.model(provider).config()
    }

    pub async fn generate(
        &self,
        provider: Provider,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        debug!(provider = provider.id(), "dispatching generate");
        self.model(provider).generate(request).await
    }

    pub async fn stream(
        &self,
        provider: Provider,
        request: &GenerateRequest,
    ) -> Result<BoxStream<'static, String>> {
        debug!(provider = provider.id(), "dispatching stream");
        self.model(provider).stream(request).await
    }

    /// [`generate`](Self::generate) addressed by tag; unknown tags are a validation error.
    pub async fn generate_tag(&self, tag: &str, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.generate(Provider::from_tag(tag)?, request).await
    }

    pub async fn stream_tag(
        &self,
        tag: &str,
        request: &GenerateRequest,
    ) -> Result<BoxStream<'static, String>> {
        self.stream(Provider::from_tag(tag)?, request).await
    }
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("models", &self.models)
            .finish()
    }
}
