//! Minimal prelude for application code.
//!
//! Goal: reduce import noise without hiding important concepts.

pub use crate::client::{AiClient, AiClientBuilder};
pub use crate::config::{FacadeConfig, ModelConfig};
pub use crate::drivers::{create_model, LanguageModel, TextGenerator};
pub use crate::facade::provider::Provider;
pub use crate::types::{
    ContentPart, FunctionCall, FunctionCallMode, FunctionDefinition, GenerateRequest,
    GenerateResponse, ImageSource, TokenUsage,
};
pub use crate::{Error, Result};
