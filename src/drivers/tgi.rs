//! Self-hosted text-generation-inference adapter.
//!
//! `POST /generate` with a single `inputs` string; images are inlined as
//! markdown data URIs. Streaming reads `token.text` from `/generate_stream` SSE
//! frames and skips special tokens.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use super::{
    generated_text, lead_text, with_lead_text, AdapterCore, CallSettings, LanguageModel,
    TextGenerator,
};
use crate::config::ModelConfig;
use crate::facade::provider::Provider;
use crate::function_call::extract_function_calls;
use crate::multimodal::ResolvedPart;
use crate::streaming::{text_deltas, Decoder, SseDecoder};
use crate::transport::HttpTransport;
use crate::types::{GenerateRequest, GenerateResponse, TokenUsage};
use crate::{BoxStream, Result};

#[derive(Debug, Clone)]
pub struct TgiModel {
    core: AdapterCore,
}

impl TgiModel {
    pub fn new(config: ModelConfig, transport: Arc<HttpTransport>) -> Self {
        Self {
            core: AdapterCore::new(Provider::Tgi, config, transport),
        }
    }

    /// Flatten parts into one prompt, images as `![](data:...)`.
    pub fn inputs(request: &GenerateRequest, parts: &[ResolvedPart]) -> String {
        with_lead_text(request, parts, lead_text(request, request.wants_functions()))
            .iter()
            .map(|p| match p {
                ResolvedPart::Text(text) => text.clone(),
                ResolvedPart::Image(img) => format!("![]({})", img.data_uri()),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn build_body(
        settings: &CallSettings,
        request: &GenerateRequest,
        parts: &[ResolvedPart],
    ) -> Value {
        let mut parameters = json!({
            "return_full_text": false,
            "details": true,
        });
        let opts = &settings.options;
        if let Some(mt) = opts.max_tokens {
            parameters["max_new_tokens"] = json!(mt);
        }
        if let Some(t) = opts.temperature {
            parameters["temperature"] = json!(t);
        }
        if let Some(p) = opts.top_p {
            parameters["top_p"] = json!(p);
        }
        json!({
            "inputs": Self::inputs(request, parts),
            "parameters": parameters,
        })
    }

    pub fn parse_response(raw: Value) -> GenerateResponse {
        let details = match &raw {
            Value::Array(items) => items.first().and_then(|i| i.get("details")),
            other => other.get("details"),
        };
        let usage = TokenUsage::from_counts(
            None,
            details
                .and_then(|d| d.get("generated_tokens"))
                .and_then(|v| v.as_u64()),
        );
        let mut response = GenerateResponse::text(generated_text(&raw), Value::Null);
        response.usage = usage;
        response.raw = raw;
        response
    }

    fn stream_token(frame: &Value) -> Option<String> {
        let token = frame.get("token")?;
        if token.get("special").and_then(|s| s.as_bool()).unwrap_or(false) {
            return None;
        }
        token.get("text").and_then(|t| t.as_str()).map(String::from)
    }

    fn stream_finished(frame: &Value) -> bool {
        frame
            .get("generated_text")
            .map(|g| !g.is_null())
            .unwrap_or(false)
    }
}

#[async_trait]
impl TextGenerator for TgiModel {
    fn provider(&self) -> Provider {
        Provider::Tgi
    }

    fn config(&self) -> &ModelConfig {
        self.core.config()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let started = Instant::now();
        let settings = self.core.settings(request)?;
        let result = async {
            let parts = self.core.images().resolve_all(request).await?;
            let body = Self::build_body(&settings, request, &parts);
            self.core
                .transport()
                .post_json(Provider::Tgi, &settings.url("/generate"), &settings.bearer(), &body)
                .await
        }
        .await;

        match result {
            Ok(raw) => {
                let mut response = Self::parse_response(raw);
                response.function_calls = extract_function_calls(&response.text, request);
                self.core.log_completion(settings.model(), started, &response);
                Ok(response)
            }
            Err(e) => Err(self.core.classify(settings.model(), request, e)),
        }
    }
}

#[async_trait]
impl LanguageModel for TgiModel {
    async fn stream(&self, request: &GenerateRequest) -> Result<BoxStream<'static, String>> {
        let settings = self.core.settings(request)?;
        let result = async {
            let parts = self.core.images().resolve_all(request).await?;
            let body = Self::build_body(&settings, request, &parts);
            self.core
                .transport()
                .post_stream(
                    Provider::Tgi,
                    &settings.url("/generate_stream"),
                    &settings.bearer(),
                    &body,
                )
                .await
        }
        .await;

        match result {
            Ok(bytes) => {
                let frames = SseDecoder::default().decode_stream(bytes);
                Ok(text_deltas(frames, Self::stream_token, Self::stream_finished))
            }
            Err(e) => Err(self.core.classify(settings.model(), request, e)),
        }
    }
}
