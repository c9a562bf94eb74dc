//! Best-effort salvage for malformed or truncated JSON emitted by models.
//!
//! Brace balancing can yield JSON that parses but is not what the model meant
//! (deeply nested truncation). Treat the output as salvage, not validation.

use serde_json::Value;

/// End offset (exclusive) of the balanced `{...}` / `[...]` span starting at `start`.
///
/// Brackets inside string literals are ignored. Returns `None` when the span
/// never closes (truncated input) or `start` is not an opening bracket.
pub fn scan_balanced(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    match bytes.get(start) {
        Some(b'{') | Some(b'[') => {}
        _ => return None,
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// End offset (exclusive) of the JSON string literal whose opening quote is at `start`.
pub fn scan_string(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'"') {
        return None;
    }
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start + 1) {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == b'"' {
            return Some(i + 1);
        }
    }
    None
}

/// Close an unterminated string, drop a dangling comma, and append the
/// missing `}` / `]` in nesting order.
pub fn balance_brackets(input: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = input.trim_end().to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    if !stack.is_empty() {
        let trimmed = out.trim_end_matches(|c: char| c.is_whitespace() || c == ',');
        out.truncate(trimmed.len());
        if out.ends_with(':') {
            out.push_str("null");
        }
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Normalize a captured arguments span into compact JSON text.
///
/// Order: parse as-is; unwrap a JSON string holding JSON; balance brackets
/// and parse again; otherwise `"{}"`. The result always parses as an object.
pub fn repair_arguments(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "{}".to_string();
    }

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return match v {
            Value::String(inner) => repair_arguments(&inner),
            obj @ Value::Object(_) => obj.to_string(),
            other => {
                tracing::debug!(original = trimmed, kind = json_kind(&other), "non-object function-call arguments");
                "{}".to_string()
            }
        };
    }

    let balanced = balance_brackets(trimmed);
    match serde_json::from_str::<Value>(&balanced) {
        Ok(v) if v.is_object() => {
            tracing::debug!(original = trimmed, repaired = %balanced, "repaired function-call arguments");
            v.to_string()
        }
        Ok(other) => {
            tracing::debug!(original = trimmed, kind = json_kind(&other), "non-object function-call arguments");
            "{}".to_string()
        }
        Err(e) => {
            tracing::debug!(original = trimmed, error = %e, "unrepairable function-call arguments");
            "{}".to_string()
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scan_balanced_ignores_brackets_in_strings() {
        let text = r#"x {"a": "}{", "b": [1, {"c": 2}]} tail"#;
        let start = text.find('{').unwrap();
        let end = scan_balanced(text, start).unwrap();
        assert_eq!(&text[start..end], r#"{"a": "}{", "b": [1, {"c": 2}]}"#);
        assert_eq!(scan_balanced(r#"{"a": 1"#, 0), None);
        assert_eq!(scan_balanced("abc", 0), None);
    }

    #[test]
    fn test_scan_string_handles_escapes() {
        let text = r#""a \"quoted\" word" rest"#;
        let end = scan_string(text, 0).unwrap();
        assert_eq!(&text[..end], r#""a \"quoted\" word""#);
    }

    #[test]
    fn test_balance_missing_closers() {
        assert_eq!(balance_brackets(r#"{"a": {"b": 1"#), r#"{"a": {"b": 1}}"#);
        assert_eq!(balance_brackets(r#"{"a": [1, 2,"#), r#"{"a": [1, 2]}"#);
        assert_eq!(balance_brackets(r#"{"unit": "cel"#), r#"{"unit": "cel"}"#);
        assert_eq!(balance_brackets(r#"{"unit":"#), r#"{"unit":null}"#);
    }

    #[test]
    fn test_repair_arguments() {
        let repaired = repair_arguments(r#"{"location": "Tokyo", "unit": "celsius""#);
        let v: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(v, json!({"location": "Tokyo", "unit": "celsius"}));

        let unwrapped = repair_arguments(r#""{\"a\": 1}""#);
        assert_eq!(unwrapped, r#"{"a":1}"#);

        assert_eq!(repair_arguments("not json at all"), "{}");
        assert_eq!(repair_arguments("   "), "{}");
    }

    #[test]
    fn test_repair_arguments_always_yields_an_object() {
        assert_eq!(repair_arguments("42"), "{}");
        assert_eq!(repair_arguments("[1,2]"), "{}");
        assert_eq!(repair_arguments("[1, 2"), "{}");
        assert_eq!(repair_arguments(r#""\"text\"""#), "{}");
        assert_eq!(repair_arguments("null"), "{}");
    }
}
