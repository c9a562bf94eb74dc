//! Error classification logic
//!
//! Adapters route every failed call through [`classify_failure`], which rewrites
//! known failure shapes into guidance errors. The original error is kept as the
//! guidance error's source.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GuidanceKind;
use crate::facade::provider::Provider;
use crate::types::GenerateRequest;
use crate::Error;

const MULTIMODAL_MARKERS: &[&str] = &[
    "image",
    "vision",
    "multimodal",
    "multi-modal",
    "unsupported",
    "content-type",
    "415",
];

static MODEL_NOT_FOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)model.*not").expect("model-not-found regex"));

/// Errors that already say what to do, or that never reached the backend.
fn is_terminal(err: &Error) -> bool {
    match err {
        Error::Validation { .. }
        | Error::Configuration { .. }
        | Error::Guidance { .. }
        | Error::FormatsExhausted { .. } => true,
        other => other
            .context()
            .and_then(|c| c.source.as_deref())
            .map(|s| s == "image_resolver")
            .unwrap_or(false),
    }
}

/// Markers are only matched against what the backend said, never against
/// transport errors whose text includes the request URL and model id.
pub(crate) fn looks_multimodal(err: &Error) -> bool {
    if err.http_status() == Some(415) {
        return true;
    }
    err.remote_text()
        .map(|text| {
            let text = text.to_lowercase();
            MULTIMODAL_MARKERS.iter().any(|m| text.contains(m))
        })
        .unwrap_or(false)
}

/// Rewrite `err` with actionable guidance when a known rule matches.
///
/// Rules, first match wins:
/// - Hugging Face 403: permission guidance.
/// - Ollama 404 or "model ... not": pull guidance naming `model`.
/// - Request carried images or structured content and the failure mentions a
///   multimodal marker: vision-model guidance.
pub(crate) fn classify_failure(
    provider: Provider,
    model: &str,
    request: &GenerateRequest,
    err: Error,
) -> Error {
    if is_terminal(&err) {
        return err;
    }
    let status = err.http_status();

    if provider == Provider::HuggingFace && status == Some(403) {
        return err.with_guidance(
            GuidanceKind::Permission,
            format!(
                "Permission denied for Hugging Face model '{}'. Check that the token has access to this model (gated models must be accepted on the model page)",
                model
            ),
        );
    }

    if provider == Provider::Ollama
        && (status == Some(404)
            || err
                .remote_text()
                .map(|t| MODEL_NOT_FOUND.is_match(&t))
                .unwrap_or(false))
    {
        return err.with_guidance(
            GuidanceKind::PullModel,
            format!(
                "Model '{}' is not available on the Ollama server. Pull it first with `ollama pull {}`",
                model, model
            ),
        );
    }

    if request.has_structured_content() && looks_multimodal(&err) {
        let suggestion = provider.defaults().vision_model;
        return err.with_guidance(
            GuidanceKind::Multimodal,
            format!(
                "Model '{}' on {} may not support image input. Try a vision-capable model such as '{}'",
                model, provider, suggestion
            ),
        );
    }

    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorContext;

    fn image_request() -> GenerateRequest {
        GenerateRequest::new("Describe").image(vec![1u8, 2, 3])
    }

    #[test]
    fn test_multimodal_guidance_on_415() {
        let err = Error::remote(Provider::OpenAi, 415, "unsupported media");
        let out = classify_failure(Provider::OpenAi, "gpt-3.5-turbo", &image_request(), err);
        assert_eq!(out.guidance_kind(), Some(GuidanceKind::Multimodal));
        let msg = out.to_string();
        assert!(msg.contains("gpt-4o"), "{msg}");
        assert!(msg.contains("original error"), "{msg}");
        assert_eq!(out.http_status(), Some(415));
    }

    #[test]
    fn test_multimodal_marker_in_text() {
        let err = Error::remote(
            Provider::Tgi,
            422,
            r#"{"error":"Input validation error: image tokens not supported"}"#,
        );
        let out = classify_failure(Provider::Tgi, "tgi", &image_request(), err);
        assert_eq!(out.guidance_kind(), Some(GuidanceKind::Multimodal));
    }

    #[test]
    fn test_text_only_request_is_untouched() {
        let err = Error::remote(Provider::OpenAi, 415, "unsupported media");
        let out = classify_failure(
            Provider::OpenAi,
            "gpt-3.5-turbo",
            &GenerateRequest::new("hi"),
            err,
        );
        assert!(out.guidance_kind().is_none());
        assert_eq!(out.http_status(), Some(415));
    }

    #[test]
    fn test_huggingface_permission() {
        let err = Error::remote(Provider::HuggingFace, 403, "forbidden");
        let out = classify_failure(
            Provider::HuggingFace,
            "meta-llama/Llama-2-7b",
            &GenerateRequest::new("hi"),
            err,
        );
        assert_eq!(out.guidance_kind(), Some(GuidanceKind::Permission));
        assert!(out.to_string().contains("meta-llama/Llama-2-7b"));
    }

    #[test]
    fn test_ollama_pull_guidance() {
        let err = Error::remote(Provider::Ollama, 404, r#"{"error":"model 'mistral' not found"}"#);
        let out = classify_failure(Provider::Ollama, "mistral", &GenerateRequest::new("hi"), err);
        assert_eq!(out.guidance_kind(), Some(GuidanceKind::PullModel));
        assert!(out.to_string().contains("ollama pull mistral"));

        let err = Error::remote(Provider::Ollama, 500, "model llava not loaded");
        let out = classify_failure(Provider::Ollama, "llava", &GenerateRequest::new("hi"), err);
        assert_eq!(out.guidance_kind(), Some(GuidanceKind::PullModel));
    }

    #[test]
    fn test_resolver_and_config_errors_pass_through() {
        let err = Error::runtime_with_context(
            "Failed to fetch image from URL: HTTP 404",
            ErrorContext::new().with_source("image_resolver"),
        );
        let out = classify_failure(Provider::Gemini, "gemini-pro", &image_request(), err);
        assert!(out.guidance_kind().is_none());
        assert!(matches!(out, Error::Runtime { .. }));

        let err = Error::configuration("missing API key");
        let out = classify_failure(Provider::OpenAi, "gpt-4o", &image_request(), err);
        assert!(matches!(out, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_on_image_request_is_untouched() {
        // Port 9 (discard) is closed on test hosts; the URL names a vision model.
        let transport = crate::transport::HttpTransport::new().unwrap();
        let err = transport
            .post_json(
                Provider::HuggingFace,
                "http://127.0.0.1:9/Salesforce/blip-image-captioning-large",
                &crate::transport::RequestAuth::None,
                &serde_json::json!({"inputs": "x"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));

        let out = classify_failure(
            Provider::HuggingFace,
            "Salesforce/blip-image-captioning-large",
            &image_request(),
            err,
        );
        assert!(out.guidance_kind().is_none());
        assert!(matches!(out, Error::Transport(_)));
    }

    #[test]
    fn test_runtime_text_mentioning_a_model_is_not_pull_guidance() {
        let err = Error::runtime("stream for model llava did not produce output");
        let out = classify_failure(Provider::Ollama, "llava", &GenerateRequest::new("hi"), err);
        assert!(out.guidance_kind().is_none());
    }

    #[test]
    fn test_unmatched_errors_pass_through() {
        let err = Error::remote(Provider::OpenAi, 429, "rate limited");
        let out = classify_failure(Provider::OpenAi, "gpt-4o", &GenerateRequest::new("x"), err);
        assert!(matches!(out, Error::Remote { status: 429, .. }));
    }
}
