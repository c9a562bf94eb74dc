//! Hugging Face 推理 API 驱动 — 多模态载荷格式协商
//!
//! Hosted inference API adapter (`POST {base}/{model}`).
//!
//! Text-only requests send `{inputs, parameters}`. Image requests go through an
//! ordered list of payload formats, since vision models on the hosted API do not
//! agree on one shape:
//!
//! | Format | Body |
//! |--------|------|
//! | [`PayloadFormat::NestedInputs`] | `{"inputs": {"text": ..., "image": ...}}` |
//! | [`PayloadFormat::FlatInputs`] | `{"inputs": "...", "image": ...}` |
//! | [`PayloadFormat::Multipart`] | form field `inputs` + one `image` file part per image |
//!
//! A rejected format is logged and the next one tried; if every format fails the
//! caller gets one [`Error::FormatsExhausted`] listing each cause.
//!
//! There is no streaming endpoint; [`create_model`](super::create_model) wraps this
//! adapter in [`SimulatedStream`](crate::streaming::SimulatedStream).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use super::{generated_text, lead_text, with_lead_text, AdapterCore, CallSettings, TextGenerator};
use crate::config::ModelConfig;
use crate::error::FormatAttempt;
use crate::facade::provider::Provider;
use crate::function_call::extract_function_calls;
use crate::multimodal::{images, joined_text, ResolvedImage};
use crate::transport::{HttpTransport, TransportError};
use crate::types::{GenerateRequest, GenerateResponse};
use crate::{Error, Result};

/// One multimodal payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    NestedInputs,
    FlatInputs,
    Multipart,
}

impl PayloadFormat {
    pub const FALLBACK_ORDER: [PayloadFormat; 3] = [
        PayloadFormat::NestedInputs,
        PayloadFormat::FlatInputs,
        PayloadFormat::Multipart,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PayloadFormat::NestedInputs => "nested_inputs",
            PayloadFormat::FlatInputs => "flat_inputs",
            PayloadFormat::Multipart => "multipart",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HuggingFaceModel {
    core: AdapterCore,
}

impl HuggingFaceModel {
    pub fn new(config: ModelConfig, transport: Arc<HttpTransport>) -> Self {
        Self {
            core: AdapterCore::new(Provider::HuggingFace, config, transport),
        }
    }

    fn parameters(settings: &CallSettings) -> Value {
        let mut parameters = json!({"return_full_text": false});
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
        parameters
    }

    pub fn text_body(settings: &CallSettings, inputs: &str) -> Value {
        json!({
            "inputs": inputs,
            "parameters": Self::parameters(settings),
        })
    }

    /// JSON body for the two JSON formats. `None` for multipart.
    pub fn json_body(
        format: PayloadFormat,
        settings: &CallSettings,
        text: &str,
        imgs: &[&ResolvedImage],
    ) -> Option<Value> {
        let (key, value) = match imgs {
            [single] => ("image", json!(single.data)),
            many => (
                "images",
                Value::Array(many.iter().map(|i| json!(i.data)).collect()),
            ),
        };
        match format {
            PayloadFormat::NestedInputs => {
                let mut inputs = json!({"text": text});
                inputs[key] = value;
                Some(json!({"inputs": inputs, "parameters": Self::parameters(settings)}))
            }
            PayloadFormat::FlatInputs => {
                let mut body = json!({"inputs": text});
                body[key] = value;
                Some(body)
            }
            PayloadFormat::Multipart => None,
        }
    }

    fn multipart_form(text: &str, imgs: &[&ResolvedImage]) -> Result<Form> {
        let mut form = Form::new().text("inputs", text.to_string());
        for (idx, img) in imgs.iter().enumerate() {
            let part = Part::bytes(img.decode()?)
                .file_name(format!("image{}.{}", idx, img.extension()))
                .mime_str(&img.mime_type)
                .map_err(|e| Error::Transport(TransportError::Http(e)))?;
            form = form.part("image", part);
        }
        Ok(form)
    }

    async fn send_format(
        &self,
        format: PayloadFormat,
        settings: &CallSettings,
        url: &str,
        text: &str,
        imgs: &[&ResolvedImage],
    ) -> Result<Value> {
        let transport = self.core.transport();
        match Self::json_body(format, settings, text, imgs) {
            Some(body) => {
                transport
                    .post_json(Provider::HuggingFace, url, &settings.bearer(), &body)
                    .await
            }
            None => {
                let form = Self::multipart_form(text, imgs)?;
                transport
                    .post_multipart(Provider::HuggingFace, url, &settings.bearer(), form)
                    .await
            }
        }
    }

    /// Try each format in order until one is accepted.
    ///
    /// Credential failures (401/403) stop the negotiation: no payload shape fixes them.
    async fn negotiate(
        &self,
        settings: &CallSettings,
        url: &str,
        text: &str,
        imgs: &[&ResolvedImage],
    ) -> Result<Value> {
        let mut attempts = Vec::new();
        for format in &PayloadFormat::FALLBACK_ORDER {
            match self.send_format(*format, settings, url, text, imgs).await {
                Ok(raw) => {
                    if !attempts.is_empty() {
                        tracing::debug!(
                            model = settings.model(),
                            format = format.name(),
                            rejected = attempts.len(),
                            "multimodal payload accepted after fallback"
                        );
                    }
                    return Ok(raw);
                }
                Err(e) if matches!(e.http_status(), Some(401) | Some(403)) => return Err(e),
                Err(e) => {
                    warn!(
                        model = settings.model(),
                        format = format.name(),
                        error = %e,
                        "multimodal payload format rejected; trying next"
                    );
                    attempts.push(FormatAttempt {
                        format: format.name(),
                        error: Box::new(e),
                    });
                }
            }
        }
        Err(Error::FormatsExhausted {
            model: settings.model().to_string(),
            attempts,
            suggestion: Provider::HuggingFace.defaults().vision_model.to_string(),
        })
    }

    pub fn parse_response(raw: Value) -> GenerateResponse {
        GenerateResponse::text(generated_text(&raw), raw)
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceModel {
    fn provider(&self) -> Provider {
        Provider::HuggingFace
    }

    fn config(&self) -> &ModelConfig {
        self.core.config()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let started = Instant::now();
        let settings = self.core.settings(request)?;
        let result = async {
            let parts = self.core.images().resolve_all(request).await?;
            let parts = with_lead_text(request, &parts, lead_text(request, request.wants_functions()));
            let text = joined_text(&parts);
            let imgs = images(&parts);
            let url = settings.url(&format!("/{}", settings.model()));
            if imgs.is_empty() {
                self.core
                    .transport()
                    .post_json(
                        Provider::HuggingFace,
                        &url,
                        &settings.bearer(),
                        &Self::text_body(&settings, &text),
                    )
                    .await
            } else {
                self.negotiate(&settings, &url, &text, &imgs).await
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedEndpoint;

    fn settings() -> CallSettings {
        CallSettings {
            endpoint: ResolvedEndpoint {
                api_key: Some("hf_x".into()),
                base_url: "https://api-inference.huggingface.co/models".into(),
                model: "llava-hf/llava-1.5-7b-hf".into(),
            },
            options: ModelConfig::new().max_tokens(50).temperature(0.4),
        }
    }

    #[test]
    fn test_text_body() {
        let body = HuggingFaceModel::text_body(&settings(), "Hello");
        assert_eq!(body["inputs"], "Hello");
        assert_eq!(body["parameters"]["max_new_tokens"], 50);
        assert_eq!(body["parameters"]["temperature"], 0.4);
        assert_eq!(body["parameters"]["return_full_text"], false);
    }

    #[test]
    fn test_nested_and_flat_bodies() {
        let img = ResolvedImage::from_bytes(&[1u8], "image/png");
        let one = [&img];
        let nested =
            HuggingFaceModel::json_body(PayloadFormat::NestedInputs, &settings(), "What?", &one)
                .unwrap();
        assert_eq!(nested["inputs"]["text"], "What?");
        assert_eq!(nested["inputs"]["image"], "AQ==");

        let flat =
            HuggingFaceModel::json_body(PayloadFormat::FlatInputs, &settings(), "What?", &one)
                .unwrap();
        assert_eq!(flat["inputs"], "What?");
        assert_eq!(flat["image"], "AQ==");

        assert!(
            HuggingFaceModel::json_body(PayloadFormat::Multipart, &settings(), "What?", &one)
                .is_none()
        );
    }

    #[test]
    fn test_multiple_images_use_images_key() {
        let a = ResolvedImage::from_bytes(&[1u8], "image/png");
        let b = ResolvedImage::from_bytes(&[2u8], "image/png");
        let nested = HuggingFaceModel::json_body(
            PayloadFormat::NestedInputs,
            &settings(),
            "Compare",
            &[&a, &b],
        )
        .unwrap();
        assert_eq!(nested["inputs"]["images"], json!(["AQ==", "Ag=="]));
        assert!(nested["inputs"].get("image").is_none());
    }

    #[test]
    fn test_parse_response_shapes() {
        assert_eq!(
            HuggingFaceModel::parse_response(json!([{"generated_text": "a cat"}])).text,
            "a cat"
        );
        assert_eq!(
            HuggingFaceModel::parse_response(json!({"generated_text": "a dog"})).text,
            "a dog"
        );
        assert_eq!(HuggingFaceModel::parse_response(json!("bare")).text, "bare");
        assert_eq!(
            HuggingFaceModel::parse_response(json!([{"label": "cat", "score": 0.9}])).text,
            r#"[{"label":"cat","score":0.9}]"#
        );
    }

    #[test]
    fn test_format_names_in_order() {
        let names: Vec<_> = PayloadFormat::FALLBACK_ORDER.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["nested_inputs", "flat_inputs", "multipart"]);
    }
}
