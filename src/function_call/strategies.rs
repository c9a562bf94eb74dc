//! Extraction strategies, ordered from strict to loose.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::{ExtractionContext, ExtractionStrategy};
use crate::types::FunctionCall;
use crate::utils::json_repair::{balance_brackets, repair_arguments, scan_balanced, scan_string};

static ENVELOPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\s*"name"\s*:\s*"((?:[^"\\]|\\.)+)"\s*,\s*"arguments"\s*:\s*"#)
        .expect("envelope pattern")
});

static CALL_SYNTAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*\{").expect("call pattern"));

static FENCED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("fence pattern")
});

/// Argument text starting at `start`: a balanced object/array, a JSON string
/// holding JSON, or the truncated remainder of the text.
fn capture_arguments(text: &str, start: usize) -> String {
    let rest = &text[start..];
    match rest.as_bytes().first() {
        Some(b'{') | Some(b'[') => match scan_balanced(text, start) {
            Some(end) => repair_arguments(&text[start..end]),
            None => repair_arguments(strip_trailing_fence(rest)),
        },
        Some(b'"') => match scan_string(text, start) {
            Some(end) => repair_arguments(&text[start..end]),
            None => repair_arguments(&balance_brackets(strip_trailing_fence(rest))),
        },
        _ => "{}".to_string(),
    }
}

fn strip_trailing_fence(s: &str) -> &str {
    s.trim_end().trim_end_matches("```").trim_end()
}

fn unescape_name(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

/// `{"name": "...", "arguments": ...}` object literals, possibly nested in a
/// `function_call` wrapper or surrounded by prose.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeStrategy;

impl ExtractionStrategy for EnvelopeStrategy {
    fn name(&self) -> &'static str {
        "envelope"
    }

    fn extract(&self, text: &str, _ctx: &ExtractionContext<'_>) -> Vec<FunctionCall> {
        let mut calls = Vec::new();
        let mut consumed = 0;
        for caps in ENVELOPE.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() < consumed {
                continue;
            }
            let arguments = capture_arguments(text, whole.end());
            consumed = scan_balanced(text, whole.start()).unwrap_or(whole.end());
            calls.push(FunctionCall::new(unescape_name(name.as_str()), arguments));
        }
        calls
    }
}

/// `identifier({...})`. With declared functions only declared names count.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallSyntaxStrategy;

impl ExtractionStrategy for CallSyntaxStrategy {
    fn name(&self) -> &'static str {
        "call_syntax"
    }

    fn extract(&self, text: &str, ctx: &ExtractionContext<'_>) -> Vec<FunctionCall> {
        let mut calls = Vec::new();
        for caps in CALL_SYNTAX.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if !ctx.is_known(name.as_str()) {
                continue;
            }
            let brace = whole.end() - 1;
            let arguments = match scan_balanced(text, brace) {
                Some(end) => repair_arguments(&text[brace..end]),
                None => repair_arguments(
                    strip_trailing_fence(&text[brace..]).trim_end_matches(')'),
                ),
            };
            calls.push(FunctionCall::new(name.as_str(), arguments));
        }
        calls
    }
}

/// JSON inside ``` fences, tagged `json` or untagged.
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedBlockStrategy;

impl FencedBlockStrategy {
    fn collect(value: &Value, ctx: &ExtractionContext<'_>, out: &mut Vec<FunctionCall>) {
        match value {
            Value::Array(items) => {
                for item in items {
                    Self::collect(item, ctx, out);
                }
            }
            Value::Object(obj) => {
                if let Some(inner) = obj.get("function_call") {
                    Self::collect(inner, ctx, out);
                    return;
                }
                if let Some(inner) = obj.get("function") {
                    if inner.is_object() {
                        Self::collect(inner, ctx, out);
                        return;
                    }
                }
                let name = obj.get("name").and_then(|n| n.as_str());
                let args = obj.get("arguments").or_else(|| obj.get("args"));
                if let (Some(name), Some(args)) = (name, args) {
                    if !ctx.is_known(name) {
                        return;
                    }
                    let arguments = match args {
                        Value::String(s) => repair_arguments(s),
                        Value::Object(_) => args.to_string(),
                        _ => "{}".to_string(),
                    };
                    out.push(FunctionCall::new(name, arguments));
                }
            }
            _ => {}
        }
    }
}

impl ExtractionStrategy for FencedBlockStrategy {
    fn name(&self) -> &'static str {
        "fenced_block"
    }

    fn extract(&self, text: &str, ctx: &ExtractionContext<'_>) -> Vec<FunctionCall> {
        let mut calls = Vec::new();
        for caps in FENCED.captures_iter(text) {
            let Some(body) = caps.get(1) else { continue };
            let body = body.as_str().trim();
            let parsed = serde_json::from_str::<Value>(body)
                .or_else(|_| serde_json::from_str::<Value>(&balance_brackets(body)));
            match parsed {
                Ok(v) => Self::collect(&v, ctx, &mut calls),
                Err(e) => tracing::debug!(error = %e, "fenced block is not JSON"),
            }
        }
        calls
    }
}

/// Parameter shapes tried when a forced function has no schema.
const BUILTIN_SHAPES: &[&[&str]] = &[&["location", "unit"], &["operation", "a", "b"]];

/// Last resort for a forced function: loose `key: value` pairs in the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForcedShapeStrategy;

impl ForcedShapeStrategy {
    fn find_value(text: &str, key: &str) -> Option<Value> {
        let pattern = format!(
            r#"(?i)(?:"|'|\b){}(?:"|')?\s*[:=]\s*("(?:[^"\\]|\\.)*"|'[^']*'|-?\d+(?:\.\d+)?\b|true\b|false\b|null\b|[A-Za-z_][\w\-]*)"#,
            regex::escape(key)
        );
        let re = Regex::new(&pattern).ok()?;
        let raw = re.captures(text)?.get(1)?.as_str();
        if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
            return Some(Value::String(inner.to_string()));
        }
        if raw.starts_with('"') {
            return serde_json::from_str(raw).ok();
        }
        Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
    }

    fn match_shape(text: &str, keys: &[&str]) -> Map<String, Value> {
        keys.iter()
            .filter_map(|k| Self::find_value(text, k).map(|v| (k.to_string(), v)))
            .collect()
    }
}

impl ExtractionStrategy for ForcedShapeStrategy {
    fn name(&self) -> &'static str {
        "forced_shape"
    }

    fn extract(&self, text: &str, ctx: &ExtractionContext<'_>) -> Vec<FunctionCall> {
        let Some(forced) = ctx.forced else {
            return Vec::new();
        };

        let declared = ctx
            .definition(forced)
            .map(|d| d.parameter_names())
            .unwrap_or_default();

        let found = if declared.is_empty() {
            BUILTIN_SHAPES
                .iter()
                .map(|shape| Self::match_shape(text, shape))
                .max_by_key(|m| m.len())
                .unwrap_or_default()
        } else {
            let keys: Vec<&str> = declared.iter().map(String::as_str).collect();
            Self::match_shape(text, &keys)
        };

        if found.is_empty() {
            return Vec::new();
        }
        tracing::debug!(function = forced, keys = found.len(), "synthesized forced function call");
        vec![FunctionCall::new(forced, Value::Object(found).to_string())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionDefinition;
    use serde_json::json;

    fn args(call: &FunctionCall) -> Value {
        call.parse_arguments().unwrap()
    }

    #[test]
    fn test_envelope_inside_function_call_wrapper_and_prose() {
        let text = r#"I'll check. {"function_call": {"name": "getWeather", "arguments": {"location": "Paris"}}} Done."#;
        let calls = EnvelopeStrategy.extract(text, &ExtractionContext::default());
        assert_eq!(calls.len(), 1);
        assert_eq!(args(&calls[0]), json!({"location": "Paris"}));
    }

    #[test]
    fn test_envelope_string_arguments_are_unwrapped() {
        let text = r#"{"name": "f", "arguments": "{\"x\": 2}"}"#;
        let calls = EnvelopeStrategy.extract(text, &ExtractionContext::default());
        assert_eq!(calls[0].arguments, r#"{"x":2}"#);
    }

    #[test]
    fn test_envelope_non_object_arguments_become_empty_object() {
        let text = r#"{"name": "f", "arguments": [1, 2]} {"name": "g", "arguments": "42"}"#;
        let calls = EnvelopeStrategy.extract(text, &ExtractionContext::default());
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments, "{}");
        assert_eq!(calls[1].arguments, "{}");
    }

    #[test]
    fn test_envelope_multiple_calls() {
        let text = r#"{"name": "a", "arguments": {}} and {"name": "b", "arguments": {"k": [1, 2]}}"#;
        let calls = EnvelopeStrategy.extract(text, &ExtractionContext::default());
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(args(&calls[1]), json!({"k": [1, 2]}));
    }

    #[test]
    fn test_envelope_irreparable_arguments_become_empty_object() {
        let text = r#"{"name": "f", "arguments": 42}"#;
        let calls = EnvelopeStrategy.extract(text, &ExtractionContext::default());
        assert_eq!(calls[0].arguments, "{}");
    }

    #[test]
    fn test_envelope_truncated_inside_fence() {
        let text = "```json\n{\"name\": \"getWeather\", \"arguments\": {\"location\": \"Tokyo\"\n```";
        let calls = EnvelopeStrategy.extract(text, &ExtractionContext::default());
        assert_eq!(args(&calls[0]), json!({"location": "Tokyo"}));
    }

    #[test]
    fn test_call_syntax_respects_declared_names() {
        let defs = vec![FunctionDefinition::new("calculate")];
        let ctx = ExtractionContext::new(&defs);
        let text = r#"print({"x": 1}) then calculate({"operation": "add", "a": 2, "b": 3})"#;
        let calls = CallSyntaxStrategy.extract(text, &ctx);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "calculate");
        assert_eq!(args(&calls[0])["b"], 3);
    }

    #[test]
    fn test_fenced_block_args_key_and_array() {
        let text = "Here:\n```json\n[{\"name\": \"a\", \"args\": {\"q\": 1}}, {\"name\": \"b\", \"arguments\": \"{}\"}]\n```";
        let calls = FencedBlockStrategy.extract(text, &ExtractionContext::default());
        assert_eq!(calls.len(), 2);
        assert_eq!(args(&calls[0]), json!({"q": 1}));
        assert_eq!(calls[1].arguments, "{}");
    }

    #[test]
    fn test_fenced_block_requires_arguments() {
        let text = "```\n{\"name\": \"a\"}\n```";
        assert!(FencedBlockStrategy
            .extract(text, &ExtractionContext::default())
            .is_empty());
    }

    #[test]
    fn test_forced_shape_builtin_weather() {
        let ctx = ExtractionContext::default().forced(Some("getWeather"));
        let text = "I would call getWeather with location: \"Tokyo\" and unit = celsius.";
        let calls = ForcedShapeStrategy.extract(text, &ctx);
        assert_eq!(calls.len(), 1);
        assert_eq!(args(&calls[0]), json!({"location": "Tokyo", "unit": "celsius"}));
    }

    #[test]
    fn test_forced_shape_builtin_calculator() {
        let ctx = ExtractionContext::default().forced(Some("calculate"));
        let text = "operation: multiply, a: 6, b: 7.5";
        let calls = ForcedShapeStrategy.extract(text, &ctx);
        assert_eq!(
            args(&calls[0]),
            json!({"operation": "multiply", "a": 6, "b": 7.5})
        );
    }

    #[test]
    fn test_forced_shape_uses_schema_keys() {
        let defs = vec![FunctionDefinition::new("lookup").parameters(json!({
            "type": "object",
            "properties": {"city": {"type": "string"}}
        }))];
        let ctx = ExtractionContext::new(&defs).forced(Some("lookup"));
        let calls = ForcedShapeStrategy.extract("'city': 'Oslo'", &ctx);
        assert_eq!(args(&calls[0]), json!({"city": "Oslo"}));
    }

    #[test]
    fn test_forced_shape_needs_forced_function() {
        assert!(ForcedShapeStrategy
            .extract("location: Tokyo", &ExtractionContext::default())
            .is_empty());
    }
}
