//! Provider 驱动抽象层 — 通过 trait 实现多后端 API 适配的动态分发
//!
//! Provider adapter layer. Each backend has one concrete type implementing
//! [`LanguageModel`]; the client holds them as `Box<dyn LanguageModel>` so the
//! same calling code works against every backend.
//!
//! | Adapter | Backends | Streaming |
//! |---------|----------|-----------|
//! | [`OpenAiModel`] | OpenAI, DeepSeek | SSE `delta.content` |
//! | [`GeminiModel`] | Google Gemini | SSE candidate parts |
//! | [`TgiModel`] | text-generation-inference | SSE `token.text` |
//! | [`OllamaModel`] | Ollama | NDJSON |
//! | [`HuggingFaceModel`] | Hugging Face inference API | synthetic, via [`SimulatedStream`] |
//!
//! [`SimulatedStream`]: crate::streaming::SimulatedStream

pub mod gemini;
pub mod huggingface;
pub mod ollama;
pub mod openai;
pub mod tgi;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::client::error_classification::classify_failure;
use crate::config::{resolve_endpoint, ModelConfig, ResolvedEndpoint};
use crate::facade::provider::Provider;
use crate::function_call::with_function_instructions;
use crate::multimodal::{ImageResolver, ResolvedPart};
use crate::transport::{HttpTransport, RequestAuth};
use crate::types::{GenerateRequest, GenerateResponse};
use crate::{BoxStream, Error, Result};

pub use gemini::GeminiModel;
pub use huggingface::HuggingFaceModel;
pub use ollama::OllamaModel;
pub use openai::OpenAiModel;
pub use tgi::TgiModel;

/// One-shot generation against a backend.
#[async_trait]
pub trait TextGenerator: Send + Sync + std::fmt::Debug {
    fn provider(&self) -> Provider;

    /// Instance defaults, before per-call overrides.
    fn config(&self) -> &ModelConfig;

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;
}

/// Full adapter contract: generation plus incremental text.
///
/// Streams are finite, per-call and not resumable; dropping one aborts the
/// underlying connection.
#[async_trait]
pub trait LanguageModel: TextGenerator {
    async fn stream(&self, request: &GenerateRequest) -> Result<BoxStream<'static, String>>;
}

/// Effective settings for a single call.
#[derive(Debug, Clone)]
pub struct CallSettings {
    pub endpoint: ResolvedEndpoint,
    /// Instance config with the call's overrides applied.
    pub options: ModelConfig,
}

impl CallSettings {
    pub fn model(&self) -> &str {
        &self.endpoint.model
    }

    /// `{base_url}{path}`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.base_url, path)
    }

    pub fn bearer(&self) -> RequestAuth {
        RequestAuth::bearer(self.endpoint.api_key.as_deref())
    }
}

/// State every adapter carries: tag, read-only defaults, shared transport.
#[derive(Debug, Clone)]
pub struct AdapterCore {
    provider: Provider,
    config: ModelConfig,
    transport: Arc<HttpTransport>,
    images: ImageResolver,
}

impl AdapterCore {
    pub fn new(provider: Provider, config: ModelConfig, transport: Arc<HttpTransport>) -> Self {
        Self {
            provider,
            config,
            images: ImageResolver::new(Arc::clone(&transport)),
            transport,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn images(&self) -> &ImageResolver {
        &self.images
    }

    /// Merge the call's overrides and resolve the endpoint. Fails before any I/O.
    pub fn settings(&self, request: &GenerateRequest) -> Result<CallSettings> {
        let options = self.config.merge(&request.options);
        let endpoint = resolve_endpoint(self.provider, &options)?;
        Ok(CallSettings { endpoint, options })
    }

    /// Apply the uniform guidance rules to a failed call.
    pub fn classify(&self, model: &str, request: &GenerateRequest, err: Error) -> Error {
        classify_failure(self.provider, model, request, err)
    }

    pub fn log_completion(&self, model: &str, started: Instant, response: &GenerateResponse) {
        let usage = response.usage.unwrap_or_default();
        info!(
            provider = self.provider.id(),
            model = model,
            duration_ms = started.elapsed().as_millis(),
            prompt_tokens = usage.prompt_tokens.unwrap_or(0),
            completion_tokens = usage.completion_tokens.unwrap_or(0),
            function_calls = response.function_calls.as_ref().map(|c| c.len()).unwrap_or(0),
            "ai-facade request completed"
        );
    }
}

/// `"{system}\n\n{prompt}"`, or the prompt alone.
pub fn merge_system(system: Option<&str>, prompt: &str) -> String {
    match system.map(str::trim).filter(|s| !s.is_empty()) {
        Some(system) if prompt.is_empty() => system.to_string(),
        Some(system) => format!("{}\n\n{}", system, prompt),
        None => prompt.to_string(),
    }
}

/// Leading text for backends that take one flat prompt: system prompt, then the
/// user prompt with function instructions appended when `inject_functions`.
pub fn lead_text(request: &GenerateRequest, inject_functions: bool) -> String {
    let prompt = if inject_functions {
        with_function_instructions(
            &request.prompt,
            &request.functions,
            request.function_call.as_ref(),
        )
    } else {
        request.prompt.clone()
    };
    merge_system(request.system_prompt.as_deref(), &prompt)
}

/// Swap the leading prompt part produced by
/// [`ImageResolver::resolve_all`](crate::multimodal::ImageResolver::resolve_all) for `lead`.
pub fn with_lead_text(
    request: &GenerateRequest,
    parts: &[ResolvedPart],
    lead: String,
) -> Vec<ResolvedPart> {
    let skip = usize::from(!request.prompt.is_empty());
    let mut out = Vec::with_capacity(parts.len() + 1);
    if !lead.is_empty() {
        out.push(ResolvedPart::Text(lead));
    }
    out.extend(parts.iter().skip(skip).cloned());
    out
}

/// Text from an inference-server style body: `[{generated_text}]`,
/// `{generated_text}`, a bare string, or else the stringified payload.
pub fn generated_text(raw: &Value) -> String {
    let from_obj = |v: &Value| {
        v.get("generated_text")
            .and_then(|t| t.as_str())
            .map(String::from)
    };
    match raw {
        Value::Array(items) => items.first().and_then(from_obj),
        Value::Object(_) => from_obj(raw),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
    .unwrap_or_else(|| raw.to_string())
}

/// Build the adapter for `provider`.
pub fn create_model(
    provider: Provider,
    config: ModelConfig,
    transport: Arc<HttpTransport>,
) -> Box<dyn LanguageModel> {
    match provider {
        Provider::OpenAi | Provider::DeepSeek => {
            Box::new(OpenAiModel::new(provider, config, transport))
        }
        Provider::Gemini => Box::new(GeminiModel::new(config, transport)),
        Provider::Tgi => Box::new(TgiModel::new(config, transport)),
        Provider::Ollama => Box::new(OllamaModel::new(config, transport)),
        Provider::HuggingFace => Box::new(crate::streaming::SimulatedStream::new(
            HuggingFaceModel::new(config, transport),
        )),
    }
}
