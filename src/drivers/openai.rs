//! OpenAI Chat Completions 驱动 — 同时服务 DeepSeek 等 OpenAI 兼容端点
//!
//! Chat-completion adapter. Key points:
//! - `messages`: optional `system` message, then one `user` message.
//! - User content is a plain string for text-only requests, otherwise an ordered
//!   array of `text` / `image_url` (data URI) parts.
//! - Native tool calling via `tools` + `tool_choice`; responses carry `tool_calls`
//!   (or the legacy `function_call`).
//! - Streaming is SSE with `choices[0].delta.content` and a `[DONE]` sentinel.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use super::{AdapterCore, CallSettings, LanguageModel, TextGenerator};
use crate::config::ModelConfig;
use crate::facade::provider::Provider;
use crate::multimodal::ResolvedPart;
use crate::streaming::{text_deltas, Decoder, SseDecoder};
use crate::transport::HttpTransport;
use crate::types::{
    FunctionCall, FunctionCallMode, GenerateRequest, GenerateResponse, TokenUsage,
};
use crate::{BoxStream, Error, Result};

const CHAT_PATH: &str = "/chat/completions";

#[derive(Debug, Clone)]
pub struct OpenAiModel {
    core: AdapterCore,
}

impl OpenAiModel {
    /// `provider` is [`Provider::OpenAi`] or [`Provider::DeepSeek`]; they differ
    /// only in env vars and defaults.
    pub fn new(provider: Provider, config: ModelConfig, transport: Arc<HttpTransport>) -> Self {
        Self {
            core: AdapterCore::new(provider, config, transport),
        }
    }

    fn user_content(request: &GenerateRequest, parts: &[ResolvedPart]) -> Value {
        if !request.has_structured_content() {
            return Value::String(request.prompt.clone());
        }
        let blocks: Vec<Value> = parts
            .iter()
            .map(|p| match p {
                ResolvedPart::Text(text) => json!({"type": "text", "text": text}),
                ResolvedPart::Image(img) => json!({
                    "type": "image_url",
                    "image_url": {"url": img.data_uri()}
                }),
            })
            .collect();
        Value::Array(blocks)
    }

    pub fn build_body(
        settings: &CallSettings,
        request: &GenerateRequest,
        parts: &[ResolvedPart],
        stream: bool,
    ) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": Self::user_content(request, parts)}));

        let mut body = json!({
            "model": settings.model(),
            "messages": messages,
            "stream": stream,
        });

        let opts = &settings.options;
        if let Some(t) = opts.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(mt) = opts.max_tokens {
            body["max_tokens"] = json!(mt);
        }
        if let Some(p) = opts.top_p {
            body["top_p"] = json!(p);
        }

        if !request.functions.is_empty() {
            let tools: Vec<Value> = request
                .functions
                .iter()
                .map(|f| {
                    let mut function = json!({"name": f.name});
                    if let Some(d) = &f.description {
                        function["description"] = json!(d);
                    }
                    function["parameters"] = f
                        .parameters
                        .clone()
                        .unwrap_or_else(|| json!({"type": "object", "properties": {}}));
                    json!({"type": "function", "function": function})
                })
                .collect();
            body["tools"] = Value::Array(tools);

            match &request.function_call {
                Some(FunctionCallMode::Auto) => body["tool_choice"] = json!("auto"),
                Some(FunctionCallMode::Forbid) => body["tool_choice"] = json!("none"),
                Some(FunctionCallMode::Force(name)) => {
                    body["tool_choice"] = json!({"type": "function", "function": {"name": name}})
                }
                None => {}
            }
        }

        body
    }

    fn arguments_text(v: Option<&Value>) -> String {
        match v {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "{}".to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn parse_response(raw: Value) -> GenerateResponse {
        let message = raw.pointer("/choices/0/message");
        let text = message
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        let mut calls: Vec<FunctionCall> = message
            .and_then(|m| m.get("tool_calls"))
            .and_then(|t| t.as_array())
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|c| {
                        let f = c.get("function")?;
                        let name = f.get("name")?.as_str()?;
                        Some(FunctionCall::new(
                            name,
                            Self::arguments_text(f.get("arguments")),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if calls.is_empty() {
            if let Some(fc) = message.and_then(|m| m.get("function_call")) {
                if let Some(name) = fc.get("name").and_then(|n| n.as_str()) {
                    calls.push(FunctionCall::new(
                        name,
                        Self::arguments_text(fc.get("arguments")),
                    ));
                }
            }
        }

        let usage = raw.get("usage").and_then(|u| {
            TokenUsage::from_counts(
                u.get("prompt_tokens").and_then(|v| v.as_u64()),
                u.get("completion_tokens").and_then(|v| v.as_u64()),
            )
            .map(|mut usage| {
                if let Some(total) = u.get("total_tokens").and_then(|v| v.as_u64()) {
                    usage.total_tokens = Some(total);
                }
                usage
            })
        });

        GenerateResponse {
            text,
            usage,
            function_calls: if calls.is_empty() { None } else { Some(calls) },
            raw,
        }
    }

    pub fn stream_delta(frame: &Value) -> Option<String> {
        frame
            .pointer("/choices/0/delta/content")
            .and_then(|c| c.as_str())
            .map(String::from)
    }
}

#[async_trait]
impl TextGenerator for OpenAiModel {
    fn provider(&self) -> Provider {
        self.core.provider()
    }

    fn config(&self) -> &ModelConfig {
        self.core.config()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let started = Instant::now();
        let settings = self.core.settings(request)?;
        let result = async {
            let parts = self.core.images().resolve_all(request).await?;
            let body = Self::build_body(&settings, request, &parts, false);
            let raw = self
                .core
                .transport()
                .post_json(
                    self.core.provider(),
                    &settings.url(CHAT_PATH),
                    &settings.bearer(),
                    &body,
                )
                .await?;
            Ok::<_, Error>(Self::parse_response(raw))
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
impl LanguageModel for OpenAiModel {
    async fn stream(&self, request: &GenerateRequest) -> Result<BoxStream<'static, String>> {
        let settings = self.core.settings(request)?;
        let result = async {
            let parts = self.core.images().resolve_all(request).await?;
            let body = Self::build_body(&settings, request, &parts, true);
            self.core
                .transport()
                .post_stream(
                    self.core.provider(),
                    &settings.url(CHAT_PATH),
                    &settings.bearer(),
                    &body,
                )
                .await
        }
        .await;

        match result {
            Ok(bytes) => {
                let frames = SseDecoder::default().decode_stream(bytes);
                Ok(text_deltas(frames, Self::stream_delta, |_| false))
            }
            Err(e) => Err(self.core.classify(settings.model(), request, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedEndpoint;
    use crate::multimodal::ResolvedImage;
    use crate::types::FunctionDefinition;

    fn settings() -> CallSettings {
        CallSettings {
            endpoint: ResolvedEndpoint {
                api_key: Some("sk".into()),
                base_url: "https://api.openai.com/v1".into(),
                model: "gpt-4o-mini".into(),
            },
            options: ModelConfig::new().temperature(0.3).max_tokens(64),
        }
    }

    #[test]
    fn test_text_only_body_uses_plain_string() {
        let req = GenerateRequest::new("2+2?").system("Answer in one word");
        let parts = vec![ResolvedPart::Text("2+2?".into())];
        let body = OpenAiModel::build_body(&settings(), &req, &parts, false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "2+2?");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["max_tokens"], 64);
        assert!(body.get("top_p").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_image_body_uses_ordered_parts() {
        let req = GenerateRequest::new("What is this?").image(vec![1u8]);
        let parts = vec![
            ResolvedPart::Text("What is this?".into()),
            ResolvedPart::Image(ResolvedImage::from_bytes(&[1u8], "image/png")),
        ];
        let body = OpenAiModel::build_body(&settings(), &req, &parts, true);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AQ==");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_tool_choice_variants() {
        let defs = vec![FunctionDefinition::new("getWeather")];
        let forced = GenerateRequest::new("x")
            .functions(defs.clone())
            .function_call(FunctionCallMode::Force("getWeather".into()));
        let body = OpenAiModel::build_body(&settings(), &forced, &[], false);
        assert_eq!(body["tools"][0]["function"]["name"], "getWeather");
        assert_eq!(body["tool_choice"]["function"]["name"], "getWeather");

        let none = GenerateRequest::new("x")
            .functions(defs)
            .function_call(FunctionCallMode::Forbid);
        let body = OpenAiModel::build_body(&settings(), &none, &[], false);
        assert_eq!(body["tool_choice"], "none");
    }

    #[test]
    fn test_parse_tool_calls_and_usage() {
        let raw = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{"id": "c1", "type": "function", "function": {
                    "name": "getWeather", "arguments": "{\"location\":\"Tokyo\"}"
                }}]
            }}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let resp = OpenAiModel::parse_response(raw);
        assert_eq!(resp.text, "");
        let calls = resp.function_calls.unwrap();
        assert_eq!(calls[0].arguments, "{\"location\":\"Tokyo\"}");
        assert_eq!(resp.usage.unwrap().total_tokens, Some(15));
    }

    #[test]
    fn test_parse_legacy_function_call_with_object_arguments() {
        let raw = json!({"choices": [{"message": {
            "content": "",
            "function_call": {"name": "f", "arguments": {"a": 1}}
        }}]});
        let resp = OpenAiModel::parse_response(raw);
        let calls = resp.function_calls.unwrap();
        assert_eq!(calls[0].name, "f");
        assert_eq!(calls[0].arguments, r#"{"a":1}"#);
        assert!(resp.usage.is_none());
    }
}
