//! Normalized response

use serde::{Deserialize, Serialize};

use crate::types::tool::FunctionCall;

/// Token usage; each count is optional since not every backend reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    /// Build from prompt/completion counts, deriving the total when both are known.
    pub fn from_counts(prompt: Option<u64>, completion: Option<u64>) -> Option<Self> {
        if prompt.is_none() && completion.is_none() {
            return None;
        }
        let total = match (prompt, completion) {
            (Some(p), Some(c)) => Some(p + c),
            _ => None,
        };
        Some(Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
        })
    }
}

/// Backend-agnostic generation result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_calls: Option<Vec<FunctionCall>>,
    /// Unmodified backend body.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl GenerateResponse {
    pub fn text(text: impl Into<String>, raw: serde_json::Value) -> Self {
        Self {
            text: text.into(),
            usage: None,
            function_calls: None,
            raw,
        }
    }

    pub fn has_function_calls(&self) -> bool {
        self.function_calls
            .as_ref()
            .map(|c| !c.is_empty())
            .unwrap_or(false)
    }
}
