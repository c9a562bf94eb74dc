//! 类型系统模块：定义统一请求/响应与函数调用的核心数据类型。
//!
//! # Types Module
//!
//! Backend-agnostic request and response shapes that every adapter converts
//! to and from.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`GenerateRequest`] | Prompt, system prompt, multimodal parts, function intent, per-call options |
//! | [`GenerateResponse`] | Text, optional usage, optional function calls, raw backend body |
//! | [`FunctionDefinition`] | Function the model may call |
//! | [`FunctionCall`] | Call emitted by the model; arguments kept as JSON text |
//!
//! ## Example
//!
//! ```rust
//! use ai_facade::types::{FunctionCallMode, FunctionDefinition, GenerateRequest};
//!
//! let req = GenerateRequest::new("What's the weather in Tokyo?")
//!     .system("Answer briefly")
//!     .functions(vec![FunctionDefinition::new("getWeather").parameters(serde_json::json!({
//!         "type": "object",
//!         "properties": {"location": {"type": "string"}}
//!     }))])
//!     .function_call(FunctionCallMode::Auto);
//! assert!(req.wants_functions());
//! ```

pub mod request;
pub mod response;
pub mod tool;

pub use request::{ContentPart, GenerateRequest, ImageSource};
pub use response::{GenerateResponse, TokenUsage};
pub use tool::{FunctionCall, FunctionCallMode, FunctionDefinition};
