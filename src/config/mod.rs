//! 配置模块：模型配置合并与凭据/地址解析
//!
//! Model configuration and endpoint resolution.
//!
//! A [`ModelConfig`] appears twice per call: once as the adapter's instance
//! defaults and once as the per-call override carried by the request. The two are
//! merged field-by-field (override wins), then credentials and base URL are resolved
//! against the backend's environment variables and hardcoded defaults.

pub mod loader;

pub use loader::FacadeConfig;

use serde::{Deserialize, Serialize};

use crate::facade::provider::Provider;
use crate::{Error, ErrorContext, Result};

/// Generation configuration shared by every backend.
///
/// All fields are optional; unset fields fall through to backend defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f64) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn top_p(mut self, p: f64) -> Self {
        self.top_p = Some(p);
        self
    }

    /// Merge a per-call override on top of these defaults. Override fields win.
    pub fn merge(&self, overrides: &ModelConfig) -> ModelConfig {
        ModelConfig {
            api_key: overrides.api_key.clone().or_else(|| self.api_key.clone()),
            base_url: overrides.base_url.clone().or_else(|| self.base_url.clone()),
            model: overrides.model.clone().or_else(|| self.model.clone()),
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            top_p: overrides.top_p.or(self.top_p),
        }
    }
}

/// Static per-backend defaults: env var names, default endpoint and models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDefaults {
    /// Env vars consulted for the API key, in order.
    pub api_key_env: &'static [&'static str],
    pub base_url_env: &'static str,
    pub default_base_url: &'static str,
    pub default_model: &'static str,
    /// Known-working vision model suggested in multimodal guidance.
    pub vision_model: &'static str,
    pub key_required: bool,
}

/// Fully resolved call target.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    pub api_key: Option<String>,
    /// Base URL without trailing slash.
    pub base_url: String,
    pub model: String,
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve key, base URL and model for `provider` from an already merged config.
///
/// Precedence for key and URL: merged config (call override, then instance), the
/// backend env var, then (URL only) the hardcoded default. A missing required key is
/// a configuration error that names the env var to set.
pub fn resolve_endpoint(provider: Provider, merged: &ModelConfig) -> Result<ResolvedEndpoint> {
    let defaults = provider.defaults();

    let api_key = merged
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| defaults.api_key_env.iter().find_map(|name| env_non_empty(name)));

    if api_key.is_none() && defaults.key_required {
        return Err(Error::configuration_with_context(
            format!(
                "No API key configured for {}. Set the {} environment variable or pass api_key in the model config",
                provider, defaults.api_key_env[0]
            ),
            ErrorContext::new()
                .with_field_path("config.api_key")
                .with_source("config"),
        ));
    }

    let base_url = merged
        .base_url
        .clone()
        .filter(|u| !u.trim().is_empty())
        .or_else(|| env_non_empty(defaults.base_url_env))
        .unwrap_or_else(|| defaults.default_base_url.to_string());

    let model = merged
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| defaults.default_model.to_string());

    Ok(ResolvedEndpoint {
        api_key,
        base_url: base_url.trim_end_matches('/').to_string(),
        model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_override_wins_field_by_field() {
        let instance = ModelConfig::new().temperature(0.2);
        let call = ModelConfig::new().temperature(0.9).max_tokens(100);
        let merged = instance.merge(&call);
        assert_eq!(merged.temperature, Some(0.9));
        assert_eq!(merged.max_tokens, Some(100));
        assert_eq!(merged.top_p, None);
    }

    #[test]
    fn test_merge_keeps_instance_when_override_absent() {
        let instance = ModelConfig::new().model("llava").top_p(0.5);
        let merged = instance.merge(&ModelConfig::default());
        assert_eq!(merged, instance);
    }

    #[test]
    fn test_resolve_explicit_values_and_trailing_slash() {
        let cfg = ModelConfig::new()
            .api_key("sk-explicit")
            .base_url("http://localhost:9999/v1/")
            .model("m");
        let ep = resolve_endpoint(Provider::OpenAi, &cfg).unwrap();
        assert_eq!(ep.api_key.as_deref(), Some("sk-explicit"));
        assert_eq!(ep.base_url, "http://localhost:9999/v1");
        assert_eq!(ep.model, "m");
    }

    #[test]
    fn test_resolve_defaults_for_keyless_backend() {
        let cfg = ModelConfig::new().base_url("http://127.0.0.1:11434");
        let ep = resolve_endpoint(Provider::Ollama, &cfg).unwrap();
        assert_eq!(ep.model, "llama3");
        assert_eq!(ep.base_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn test_missing_required_key_names_env_var() {
        // DEEPSEEK_API_KEY is not expected to be set in the test environment.
        if std::env::var("DEEPSEEK_API_KEY").is_ok() {
            return;
        }
        let err = resolve_endpoint(Provider::DeepSeek, &ModelConfig::default()).unwrap_err();
        assert!(err.to_string().contains("DEEPSEEK_API_KEY"));
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
