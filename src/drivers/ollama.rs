//! Ollama 本地守护进程驱动 — generate/chat 双端点与 NDJSON 流
//!
//! Local daemon adapter.
//! - Text-only requests go to `/api/generate` with a flat `prompt`.
//! - Any image, function definition or system prompt switches to `/api/chat`;
//!   function definitions are rendered into the system message.
//! - Streaming is NDJSON; the text field is `message.content` (chat) or
//!   `response` (generate), and a frame with `done: true` ends the stream.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use super::{AdapterCore, CallSettings, LanguageModel, TextGenerator};
use crate::config::ModelConfig;
use crate::facade::provider::Provider;
use crate::function_call::{extract_function_calls, function_instructions};
use crate::multimodal::{images, joined_text, ResolvedPart};
use crate::streaming::{text_deltas, Decoder, NdjsonDecoder};
use crate::transport::HttpTransport;
use crate::types::{GenerateRequest, GenerateResponse, TokenUsage};
use crate::{BoxStream, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OllamaEndpoint {
    Generate,
    Chat,
}

impl OllamaEndpoint {
    pub fn for_request(request: &GenerateRequest) -> Self {
        let has_system = request
            .system_prompt
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        if request.has_images() || !request.functions.is_empty() || has_system {
            OllamaEndpoint::Chat
        } else {
            OllamaEndpoint::Generate
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            OllamaEndpoint::Generate => "/api/generate",
            OllamaEndpoint::Chat => "/api/chat",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OllamaModel {
    core: AdapterCore,
}

impl OllamaModel {
    pub fn new(config: ModelConfig, transport: Arc<HttpTransport>) -> Self {
        Self {
            core: AdapterCore::new(Provider::Ollama, config, transport),
        }
    }

    fn options(settings: &CallSettings) -> Option<Value> {
        let opts = &settings.options;
        let mut out = serde_json::Map::new();
        if let Some(t) = opts.temperature {
            out.insert("temperature".into(), json!(t));
        }
        if let Some(p) = opts.top_p {
            out.insert("top_p".into(), json!(p));
        }
        if let Some(n) = opts.max_tokens {
            out.insert("num_predict".into(), json!(n));
        }
        (!out.is_empty()).then_some(Value::Object(out))
    }

    fn system_message(request: &GenerateRequest) -> Option<Value> {
        let system = request
            .system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let instructions =
            function_instructions(&request.functions, request.function_call.as_ref());
        let content = match (system, instructions) {
            (Some(s), Some(i)) => format!("{}\n\n{}", s, i),
            (Some(s), None) => s.to_string(),
            (None, Some(i)) => i,
            (None, None) => return None,
        };
        Some(json!({"role": "system", "content": content}))
    }

    fn user_message(request: &GenerateRequest, parts: &[ResolvedPart]) -> Value {
        if !request.has_images() {
            return json!({"role": "user", "content": joined_text(parts)});
        }
        let content: Vec<Value> = parts
            .iter()
            .map(|p| match p {
                ResolvedPart::Text(text) => json!({"type": "text", "text": text}),
                ResolvedPart::Image(img) => json!({
                    "type": "image",
                    "image": {"data": img.data, "mimeType": img.mime_type}
                }),
            })
            .collect();
        let raw_images: Vec<&str> = images(parts).iter().map(|i| i.data.as_str()).collect();
        json!({"role": "user", "content": content, "images": raw_images})
    }

    pub fn build_body(
        settings: &CallSettings,
        request: &GenerateRequest,
        parts: &[ResolvedPart],
        stream: bool,
    ) -> (OllamaEndpoint, Value) {
        let endpoint = OllamaEndpoint::for_request(request);
        let mut body = match endpoint {
            OllamaEndpoint::Generate => json!({
                "model": settings.model(),
                "prompt": joined_text(parts),
                "stream": stream,
            }),
            OllamaEndpoint::Chat => {
                let mut messages = Vec::new();
                if let Some(system) = Self::system_message(request) {
                    messages.push(system);
                }
                messages.push(Self::user_message(request, parts));
                json!({
                    "model": settings.model(),
                    "messages": messages,
                    "stream": stream,
                })
            }
        };
        if let Some(options) = Self::options(settings) {
            body["options"] = options;
        }
        (endpoint, body)
    }

    /// Text of a chat or generate body (or stream frame).
    fn frame_text(frame: &Value) -> Option<String> {
        frame
            .pointer("/message/content")
            .or_else(|| frame.get("response"))
            .and_then(|t| t.as_str())
            .map(String::from)
    }

    pub fn parse_response(raw: Value) -> GenerateResponse {
        let text = Self::frame_text(&raw).unwrap_or_default();
        let usage = TokenUsage::from_counts(
            raw.get("prompt_eval_count").and_then(|v| v.as_u64()),
            raw.get("eval_count").and_then(|v| v.as_u64()),
        );
        GenerateResponse {
            text,
            usage,
            function_calls: None,
            raw,
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaModel {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    fn config(&self) -> &ModelConfig {
        self.core.config()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let started = Instant::now();
        let settings = self.core.settings(request)?;
        let result = async {
            let parts = self.core.images().resolve_all(request).await?;
            let (endpoint, body) = Self::build_body(&settings, request, &parts, false);
            self.core
                .transport()
                .post_json(
                    Provider::Ollama,
                    &settings.url(endpoint.path()),
                    &settings.bearer(),
                    &body,
                )
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
impl LanguageModel for OllamaModel {
    async fn stream(&self, request: &GenerateRequest) -> Result<BoxStream<'static, String>> {
        let settings = self.core.settings(request)?;
        let result = async {
            let parts = self.core.images().resolve_all(request).await?;
            let (endpoint, body) = Self::build_body(&settings, request, &parts, true);
            self.core
                .transport()
                .post_stream(
                    Provider::Ollama,
                    &settings.url(endpoint.path()),
                    &settings.bearer(),
                    &body,
                )
                .await
        }
        .await;

        match result {
            Ok(bytes) => {
                let frames = NdjsonDecoder.decode_stream(bytes);
                Ok(text_deltas(frames, Self::frame_text, |frame| {
                    frame.get("done").and_then(|d| d.as_bool()).unwrap_or(false)
                }))
            }
            Err(e) => Err(self.core.classify(settings.model(), request, e)),
        }
    }
}
