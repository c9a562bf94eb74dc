//! Gemini generateContent 驱动 — 实现 Google Gemini 特有的请求/响应格式转换
//!
//! Google Gemini generateContent adapter. Key differences:
//! - Uses `contents: [{parts}]` with no roles; the system prompt is merged into the
//!   leading text part.
//! - Images travel as `inlineData: {data, mimeType}` parts.
//! - `generationConfig` wraps temperature, max tokens (→ `maxOutputTokens`) and `topP`.
//! - API key is sent in the `x-goog-api-key` header.
//! - No native tool calling on this path: function definitions are injected into the
//!   prompt and the text is mined afterwards. If that call fails, the request is
//!   retried once as a plain generation.
//! - Streaming uses `:streamGenerateContent?alt=sse`; each frame is a partial response.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use super::{lead_text, with_lead_text, AdapterCore, CallSettings, LanguageModel, TextGenerator};
use crate::config::ModelConfig;
use crate::facade::provider::Provider;
use crate::function_call::{ExtractionContext, FunctionCallExtractor};
use crate::multimodal::ResolvedPart;
use crate::streaming::{text_deltas, Decoder, SseDecoder};
use crate::transport::{HttpTransport, RequestAuth};
use crate::types::{FunctionCall, GenerateRequest, GenerateResponse, TokenUsage};
use crate::{BoxStream, Result};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Gemini adapter.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    core: AdapterCore,
}

impl GeminiModel {
    pub fn new(config: ModelConfig, transport: Arc<HttpTransport>) -> Self {
        Self {
            core: AdapterCore::new(Provider::Gemini, config, transport),
        }
    }

    fn auth(settings: &CallSettings) -> RequestAuth {
        match &settings.endpoint.api_key {
            Some(key) => RequestAuth::Header {
                name: API_KEY_HEADER,
                value: key.clone(),
            },
            None => RequestAuth::None,
        }
    }

    /// Convert resolved parts to Gemini `parts`.
    fn content_to_parts(parts: &[ResolvedPart]) -> Vec<Value> {
        parts
            .iter()
            .map(|p| match p {
                ResolvedPart::Text(text) => json!({ "text": text }),
                ResolvedPart::Image(img) => json!({
                    "inlineData": { "data": img.data, "mimeType": img.mime_type }
                }),
            })
            .collect()
    }

    pub fn build_body(
        settings: &CallSettings,
        request: &GenerateRequest,
        parts: &[ResolvedPart],
        inject_functions: bool,
    ) -> Value {
        let parts = with_lead_text(request, parts, lead_text(request, inject_functions));
        let mut body = json!({
            "contents": [{ "parts": Self::content_to_parts(&parts) }],
        });

        // Gemini uses `generationConfig` for parameters
        let opts = &settings.options;
        let mut gen_config = serde_json::Map::new();
        if let Some(t) = opts.temperature {
            gen_config.insert("temperature".into(), json!(t));
        }
        if let Some(mt) = opts.max_tokens {
            gen_config.insert("maxOutputTokens".into(), json!(mt));
        }
        if let Some(p) = opts.top_p {
            gen_config.insert("topP".into(), json!(p));
        }
        if !gen_config.is_empty() {
            body["generationConfig"] = Value::Object(gen_config);
        }
        body
    }

    /// Concatenated text of the first candidate's parts.
    fn candidate_text(body: &Value) -> String {
        body.pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    pub fn parse_response(raw: Value) -> GenerateResponse {
        // Gemini: { candidates: [{ content: { parts: [{text: "..."}] } }], usageMetadata }
        let text = Self::candidate_text(&raw);

        let usage = raw.get("usageMetadata").and_then(|u| {
            TokenUsage::from_counts(
                u.get("promptTokenCount").and_then(|v| v.as_u64()),
                u.get("candidatesTokenCount").and_then(|v| v.as_u64()),
            )
            .map(|mut usage| {
                if let Some(total) = u.get("totalTokenCount").and_then(|v| v.as_u64()) {
                    usage.total_tokens = Some(total);
                }
                usage
            })
        });

        // Native functionCall parts, if the model emitted any anyway.
        let calls: Vec<FunctionCall> = raw
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("functionCall"))
                    .filter_map(|fc| {
                        let name = fc.get("name")?.as_str()?;
                        let args = fc.get("args").cloned().unwrap_or_else(|| json!({}));
                        Some(FunctionCall::new(name, args.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        GenerateResponse {
            text,
            usage,
            function_calls: if calls.is_empty() { None } else { Some(calls) },
            raw,
        }
    }

    async fn generate_once(
        &self,
        settings: &CallSettings,
        request: &GenerateRequest,
        parts: &[ResolvedPart],
        inject_functions: bool,
    ) -> Result<GenerateResponse> {
        let body = Self::build_body(settings, request, parts, inject_functions);
        let url = settings.url(&format!("/models/{}:generateContent", settings.model()));
        let raw = self
            .core
            .transport()
            .post_json(Provider::Gemini, &url, &Self::auth(settings), &body)
            .await?;
        let mut response = Self::parse_response(raw);
        if inject_functions && response.function_calls.is_none() {
            response.function_calls = FunctionCallExtractor::default()
                .extract(&response.text, &ExtractionContext::from_request(request));
        }
        Ok(response)
    }
}

#[async_trait]
impl TextGenerator for GeminiModel {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn config(&self) -> &ModelConfig {
        self.core.config()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let started = Instant::now();
        let settings = self.core.settings(request)?;
        let result = async {
            let parts = self.core.images().resolve_all(request).await?;
            if request.wants_functions() {
                match self.generate_once(&settings, request, &parts, true).await {
                    Ok(response) => return Ok(response),
                    Err(e) => warn!(
                        provider = "gemini",
                        model = settings.model(),
                        error = %e,
                        "function-calling generation failed; retrying as plain generation"
                    ),
                }
            }
            self.generate_once(&settings, request, &parts, false).await
        }
        .await;

        match result {
            Ok(response) => {
                self.core.log_completion(settings.model(), started, &response);
                Ok(response)
            }
            Err(e) => Err(self.core.classify(settings.model(), request, e)),
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn stream(&self, request: &GenerateRequest) -> Result<BoxStream<'static, String>> {
        let settings = self.core.settings(request)?;
        let result = async {
            let parts = self.core.images().resolve_all(request).await?;
            let body = Self::build_body(&settings, request, &parts, request.wants_functions());
            let url = settings.url(&format!(
                "/models/{}:streamGenerateContent?alt=sse",
                settings.model()
            ));
            self.core
                .transport()
                .post_stream(Provider::Gemini, &url, &Self::auth(&settings), &body)
                .await
        }
        .await;

        match result {
            Ok(bytes) => {
                let frames = SseDecoder::default().decode_stream(bytes);
                Ok(text_deltas(
                    frames,
                    |frame| Some(Self::candidate_text(frame)),
                    |_| false,
                ))
            }
            Err(e) => Err(self.core.classify(settings.model(), request, e)),
        }
    }
}
