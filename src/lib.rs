//! # ai-facade
//!
//! 统一的大模型客户端门面：一套请求/响应契约覆盖多个后端，支持多模态输入与函数调用。
//!
//! Unified LLM client facade. One normalized request/response contract over
//! hosted and self-hosted backends, with multimodal input and function calling
//! on every backend, native or prompt-emulated.
//!
//! ## Supported Backends
//!
//! - **OpenAI / DeepSeek**: chat completions with native tool calls
//! - **Google Gemini**: generateContent with prompt-injected functions
//! - **Hugging Face**: hosted inference API with multimodal payload negotiation
//! - **TGI**: self-hosted text-generation-inference
//! - **Ollama**: local daemon, generate and chat endpoints
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_facade::{AiClient, GenerateRequest, Provider};
//!
//! #[tokio::main]
//! async fn main() -> ai_facade::Result<()> {
//!     let client = AiClient::new().await?;
//!
//!     let request = GenerateRequest::new("What is in this picture?")
//!         .system("Answer in one sentence")
//!         .image("https://example.com/cat.jpg");
//!     let response = client.generate(Provider::Gemini, &request).await?;
//!     println!("{}", response.text);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Dispatching client and builder |
//! | [`drivers`] | One adapter per backend behind [`LanguageModel`] |
//! | [`types`] | Normalized request, response and function-call types |
//! | [`multimodal`] | Image source resolution to base64 + MIME |
//! | [`function_call`] | Function-call extraction from free text |
//! | [`streaming`] | SSE/NDJSON decoding and synthetic chunking |
//! | [`config`] | Model config merge, endpoint resolution, YAML loader |
//! | [`transport`] | Shared HTTP transport |

pub mod client;
pub mod config;
pub mod drivers;
pub mod error_code;
pub mod facade;
pub mod function_call;
pub mod multimodal;
pub mod streaming;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use client::{AiClient, AiClientBuilder};
pub use config::{FacadeConfig, ModelConfig};
pub use drivers::{create_model, LanguageModel, TextGenerator};
pub use facade::provider::Provider;
pub use types::{
    ContentPart, FunctionCall, FunctionCallMode, FunctionDefinition, GenerateRequest,
    GenerateResponse, ImageSource, TokenUsage,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for stream items
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, GuidanceKind};
