//! End-to-end generate calls against mocked backends.

mod common;

use ai_facade::{GenerateRequest, ModelConfig, Provider};
use common::MockServerFixture;
use mockito::Matcher;
use serde_json::json;

fn question() -> GenerateRequest {
    GenerateRequest::new("2+2?").system("Answer in one word")
}

#[tokio::test]
async fn openai_answers_four() {
    let mut fx = MockServerFixture::new().await;
    let mock = fx
        .server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "Answer in one word"},
                {"role": "user", "content": "2+2?"}
            ],
            "stream": false
        })))
        .with_status(200)
        .with_body(
            json!({
                "choices": [{"message": {"role": "assistant", "content": "Four"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = fx.client(Provider::OpenAi, fx.config()).await;
    let resp = client.generate(Provider::OpenAi, &question()).await.unwrap();
    assert_eq!(resp.text, "Four");
    assert_eq!(resp.usage.unwrap().total_tokens, Some(13));
    assert!(resp.function_calls.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn deepseek_uses_chat_completions() {
    let mut fx = MockServerFixture::new().await;
    let mock = fx
        .server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"model": "deepseek-chat"})))
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"content":"Four"}}]}"#)
        .create_async()
        .await;

    let client = fx.client(Provider::DeepSeek, fx.config()).await;
    let resp = client.generate_tag("deepseek", &question()).await.unwrap();
    assert_eq!(resp.text, "Four");
    assert!(resp.usage.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn gemini_answers_four() {
    let mut fx = MockServerFixture::new().await;
    let mock = fx
        .server
        .mock("POST", "/models/gemini-1.5-flash:generateContent")
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{"parts": [{"text": "Answer in one word\n\n2+2?"}]}]
        })))
        .with_status(200)
        .with_body(
            json!({
                "candidates": [{"content": {"parts": [{"text": "Four"}], "role": "model"}}],
                "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 1, "totalTokenCount": 10}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = fx.client(Provider::Gemini, fx.config()).await;
    let resp = client.generate(Provider::Gemini, &question()).await.unwrap();
    assert_eq!(resp.text, "Four");
    assert_eq!(resp.usage.unwrap().prompt_tokens, Some(9));
    mock.assert_async().await;
}

#[tokio::test]
async fn tgi_answers_four() {
    let mut fx = MockServerFixture::new().await;
    let mock = fx
        .server
        .mock("POST", "/generate")
        .match_body(Matcher::PartialJson(json!({
            "inputs": "Answer in one word\n\n2+2?",
            "parameters": {"max_new_tokens": 16, "return_full_text": false}
        })))
        .with_status(200)
        .with_body(r#"{"generated_text":"Four","details":{"generated_tokens":1}}"#)
        .create_async()
        .await;

    let config = fx.config().max_tokens(16);
    let client = fx.client(Provider::Tgi, config).await;
    let resp = client.generate(Provider::Tgi, &question()).await.unwrap();
    assert_eq!(resp.text, "Four");
    assert_eq!(resp.usage.unwrap().completion_tokens, Some(1));
    mock.assert_async().await;
}

#[tokio::test]
async fn ollama_answers_four_over_chat() {
    let mut fx = MockServerFixture::new().await;
    let mock = fx
        .server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3",
            "stream": false,
            "messages": [
                {"role": "system", "content": "Answer in one word"},
                {"role": "user", "content": "2+2?"}
            ]
        })))
        .with_status(200)
        .with_body(r#"{"message":{"role":"assistant","content":"Four"},"done":true,"prompt_eval_count":20,"eval_count":2}"#)
        .create_async()
        .await;

    let config = ModelConfig::new().base_url(fx.base_url.clone());
    let client = fx.client(Provider::Ollama, config).await;
    let resp = client.generate(Provider::Ollama, &question()).await.unwrap();
    assert_eq!(resp.text, "Four");
    assert_eq!(resp.usage.unwrap().total_tokens, Some(22));
    mock.assert_async().await;
}

#[tokio::test]
async fn ollama_plain_prompt_uses_generate() {
    let mut fx = MockServerFixture::new().await;
    let mock = fx
        .server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({"prompt": "2+2?", "stream": false})))
        .with_status(200)
        .with_body(r#"{"response":"Four","done":true}"#)
        .create_async()
        .await;

    let config = ModelConfig::new().base_url(fx.base_url.clone());
    let client = fx.client(Provider::Ollama, config).await;
    let resp = client
        .generate(Provider::Ollama, &GenerateRequest::new("2+2?"))
        .await
        .unwrap();
    assert_eq!(resp.text, "Four");
    mock.assert_async().await;
}

#[tokio::test]
async fn huggingface_answers_four() {
    let mut fx = MockServerFixture::new().await;
    let mock = fx
        .server
        .mock("POST", "/mistralai/Mistral-7B-Instruct-v0.2")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "inputs": "Answer in one word\n\n2+2?",
            "parameters": {"return_full_text": false}
        })))
        .with_status(200)
        .with_body(r#"[{"generated_text":"Four"}]"#)
        .create_async()
        .await;

    let client = fx.client(Provider::HuggingFace, fx.config()).await;
    let resp = client.generate(Provider::HuggingFace, &question()).await.unwrap();
    assert_eq!(resp.text, "Four");
    mock.assert_async().await;
}

#[tokio::test]
async fn call_overrides_win_over_instance_config() {
    let mut fx = MockServerFixture::new().await;
    let mock = fx
        .server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "temperature": 0.9,
            "max_tokens": 5
        })))
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"content":"Four"}}]}"#)
        .create_async()
        .await;

    let config = fx.config().model("gpt-4o-mini").temperature(0.1).max_tokens(5);
    let client = fx.client(Provider::OpenAi, config).await;
    let request = question().options(ModelConfig::new().model("gpt-4o").temperature(0.9));
    let resp = client.generate(Provider::OpenAi, &request).await.unwrap();
    assert_eq!(resp.text, "Four");
    mock.assert_async().await;
}
