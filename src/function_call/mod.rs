//! 函数调用文本提取模块 — 从模型自由文本中恢复结构化函数调用
//!
//! # Function-Call Text Extraction
//!
//! Backends without native tool calling are told (via [`prompt`]) to emit a
//! JSON envelope; this module recovers `{name, arguments}` calls from whatever
//! text comes back. Extraction is a pipeline of independent strategies, the
//! first one producing calls wins:
//!
//! | Strategy | Matches |
//! |----------|---------|
//! | [`EnvelopeStrategy`] | `{"name": "...", "arguments": {...}}` anywhere in the text |
//! | [`CallSyntaxStrategy`] | `getWeather({"location": "Tokyo"})` |
//! | [`FencedBlockStrategy`] | JSON inside a fenced code block with `name` + `arguments`/`args` |
//! | [`ForcedShapeStrategy`] | loose `key: value` pairs for a forced function |
//!
//! Extraction never fails: no match yields `None`.
//!
//! ```rust
//! use ai_facade::function_call::{ExtractionContext, FunctionCallExtractor};
//!
//! let text = r#"Sure. {"name": "getWeather", "arguments": {"location": "Tokyo", "unit": "celsius"}}"#;
//! let calls = FunctionCallExtractor::default()
//!     .extract(text, &ExtractionContext::default())
//!     .unwrap();
//! assert_eq!(calls[0].name, "getWeather");
//! ```

pub mod prompt;
pub mod strategies;

use crate::types::{FunctionCall, FunctionDefinition, GenerateRequest};

pub use prompt::{function_instructions, with_function_instructions};
pub use strategies::{
    CallSyntaxStrategy, EnvelopeStrategy, FencedBlockStrategy, ForcedShapeStrategy,
};

/// What the extractor knows about the originating request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionContext<'a> {
    pub functions: &'a [FunctionDefinition],
    pub forced: Option<&'a str>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(functions: &'a [FunctionDefinition]) -> Self {
        Self {
            functions,
            forced: None,
        }
    }

    pub fn forced(mut self, name: Option<&'a str>) -> Self {
        self.forced = name;
        self
    }

    pub fn from_request(request: &'a GenerateRequest) -> Self {
        Self::new(&request.functions).forced(request.forced_function())
    }

    pub fn definition(&self, name: &str) -> Option<&'a FunctionDefinition> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// True when `name` is declared, or when nothing is declared.
    pub fn is_known(&self, name: &str) -> bool {
        self.functions.is_empty() || self.definition(name).is_some()
    }
}

/// One independent way of spotting function calls in text.
pub trait ExtractionStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Calls found in `text`; empty means no match.
    fn extract(&self, text: &str, ctx: &ExtractionContext<'_>) -> Vec<FunctionCall>;
}

/// First-success-wins pipeline of [`ExtractionStrategy`]s.
#[derive(Debug)]
pub struct FunctionCallExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for FunctionCallExtractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(EnvelopeStrategy),
            Box::new(CallSyntaxStrategy),
            Box::new(FencedBlockStrategy),
            Box::new(ForcedShapeStrategy),
        ])
    }
}

impl FunctionCallExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn extract(&self, text: &str, ctx: &ExtractionContext<'_>) -> Option<Vec<FunctionCall>> {
        if text.trim().is_empty() {
            return None;
        }
        for strategy in &self.strategies {
            let calls = strategy.extract(text, ctx);
            if !calls.is_empty() {
                tracing::debug!(
                    strategy = strategy.name(),
                    count = calls.len(),
                    "extracted function calls from text"
                );
                return Some(calls);
            }
        }
        None
    }
}

/// Run the default extractor for a request's function context.
pub fn extract_function_calls(text: &str, request: &GenerateRequest) -> Option<Vec<FunctionCall>> {
    if !request.wants_functions() {
        return None;
    }
    FunctionCallExtractor::default().extract(text, &ExtractionContext::from_request(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionCallMode;
    use serde_json::json;

    #[test]
    fn test_get_weather_envelope() {
        let text = r#"{"name": "getWeather", "arguments": {"location": "Tokyo", "unit": "celsius"}}"#;
        let calls = FunctionCallExtractor::default()
            .extract(text, &ExtractionContext::default())
            .unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "getWeather");
        assert_eq!(
            calls[0].parse_arguments().unwrap(),
            json!({"location": "Tokyo", "unit": "celsius"})
        );
    }

    #[test]
    fn test_truncated_arguments_are_repaired() {
        let text = r#"{"name": "getWeather", "arguments": {"location": "Tokyo", "unit": "celsius""#;
        let calls = FunctionCallExtractor::default()
            .extract(text, &ExtractionContext::default())
            .unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].parse_arguments().is_ok());
    }

    #[test]
    fn test_no_match_is_none() {
        let extractor = FunctionCallExtractor::default();
        assert!(extractor
            .extract("The weather is nice today.", &ExtractionContext::default())
            .is_none());
        assert!(extractor.extract("", &ExtractionContext::default()).is_none());
    }

    #[test]
    fn test_earlier_strategy_wins() {
        let text = "calc({\"a\": 1})\n```json\n{\"name\": \"other\", \"args\": {}}\n```";
        let calls = FunctionCallExtractor::default()
            .extract(text, &ExtractionContext::default())
            .unwrap();
        assert_eq!(calls[0].name, "calc");
        assert_eq!(
            FunctionCallExtractor::default().strategy_names(),
            vec!["envelope", "call_syntax", "fenced_block", "forced_shape"]
        );
    }

    #[test]
    fn test_forbid_skips_extraction() {
        let req = GenerateRequest::new("x")
            .functions(vec![FunctionDefinition::new("getWeather")])
            .function_call(FunctionCallMode::Forbid);
        let text = r#"{"name": "getWeather", "arguments": {}}"#;
        assert!(extract_function_calls(text, &req).is_none());
    }

    #[test]
    fn test_context_known_names() {
        let defs = vec![FunctionDefinition::new("a")];
        let ctx = ExtractionContext::new(&defs);
        assert!(ctx.is_known("a"));
        assert!(!ctx.is_known("b"));
        assert!(ExtractionContext::default().is_known("anything"));
    }
}
