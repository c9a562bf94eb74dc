//! YAML configuration loader
//!
//! A facade config file maps provider tags to default [`ModelConfig`]s:
//!
//! ```yaml
//! providers:
//!   openai:
//!     model: gpt-4o-mini
//!     temperature: 0.2
//!   ollama:
//!     base_url: http://gpu-box:11434
//!     model: llava
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::ModelConfig;
use crate::facade::provider::Provider;
use crate::{Error, ErrorContext, Result};

/// Env var pointing at a facade config file.
pub const CONFIG_PATH_ENV: &str = "AI_FACADE_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacadeConfig {
    #[serde(default)]
    pub providers: HashMap<String, ModelConfig>,
}

impl FacadeConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: FacadeConfig = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid facade config: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })?;
        // Reject unknown provider keys early instead of silently ignoring them.
        for key in cfg.providers.keys() {
            Provider::from_tag(key).map_err(|e| {
                Error::configuration_with_context(
                    e.to_string(),
                    ErrorContext::new()
                        .with_field_path(format!("providers.{}", key))
                        .with_source("config_loader"),
                )
            })?;
        }
        Ok(cfg)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read facade config: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Load from `AI_FACADE_CONFIG` if set; otherwise an empty config.
    pub async fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_path(path.trim()).await,
            _ => Ok(Self::default()),
        }
    }

    /// Instance defaults configured for `provider` (alias keys included).
    pub fn config_for(&self, provider: Provider) -> ModelConfig {
        self.providers
            .iter()
            .find(|(key, _)| Provider::from_tag(key).ok() == Some(provider))
            .map(|(_, cfg)| cfg.clone())
            .unwrap_or_default()
    }
}
