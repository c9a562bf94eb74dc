use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::core::AiClient;
use crate::config::{FacadeConfig, ModelConfig};
use crate::facade::provider::Provider;
use crate::transport::HttpTransport;
use crate::Result;

/// Builder for creating clients with custom configuration.
///
/// Defaults are layered: config file (explicit path, else `AI_FACADE_CONFIG`),
/// then per-provider configs set on the builder. Env vars and hardcoded
/// defaults are applied later, per call.
#[derive(Default)]
pub struct AiClientBuilder {
    config: Option<FacadeConfig>,
    config_path: Option<PathBuf>,
    overrides: HashMap<Provider, ModelConfig>,
    transport: Option<Arc<HttpTransport>>,
}

impl AiClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instance defaults for one backend. Fields set here win over the config file.
    pub fn provider_config(mut self, provider: Provider, config: ModelConfig) -> Self {
        self.overrides.insert(provider, config);
        self
    }

    /// Use an already-loaded config instead of reading a file.
    pub fn config(mut self, config: FacadeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Read defaults from a YAML file at build time.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Share a transport (for example one built from a custom `reqwest::Client`).
    pub fn transport(mut self, transport: Arc<HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub async fn build(self) -> Result<AiClient> {
        let file = match (self.config, self.config_path) {
            (Some(cfg), _) => cfg,
            (None, Some(path)) => FacadeConfig::from_path(path).await?,
            (None, None) => FacadeConfig::from_env().await?,
        };

        let configs = Provider::ALL
            .iter()
            .map(|p| {
                let base = file.config_for(*p);
                let merged = match self.overrides.get(p) {
                    Some(overrides) => base.merge(overrides),
                    None => base,
                };
                (*p, merged)
            })
            .collect();

        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()?),
        };
        Ok(AiClient::from_configs(configs, transport))
    }
}
