//! Function-calling instructions for backends without native tool calling.

use serde_json::{json, Value};

use crate::types::{FunctionCallMode, FunctionDefinition};

/// Instruction block describing `functions` and the JSON envelope the model must emit.
///
/// `None` when there is nothing to describe or calling is forbidden.
pub fn function_instructions(
    functions: &[FunctionDefinition],
    mode: Option<&FunctionCallMode>,
) -> Option<String> {
    if functions.is_empty() || matches!(mode, Some(FunctionCallMode::Forbid)) {
        return None;
    }

    let defs: Vec<Value> = functions
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "description": f.description.clone().unwrap_or_default(),
                "parameters": f.parameters.clone().unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            })
        })
        .collect();
    let rendered = serde_json::to_string_pretty(&defs).unwrap_or_else(|_| Value::Array(defs).to_string());

    let mut out = String::new();
    out.push_str("You have access to the following functions:\n```json\n");
    out.push_str(&rendered);
    out.push_str("\n```\n\n");
    out.push_str(
        "To call a function, respond with a JSON object in exactly this format and nothing else:\n",
    );
    out.push_str(r#"{"function_call": {"name": "<function name>", "arguments": {<arguments as a JSON object>}}}"#);
    out.push('\n');
    match mode {
        Some(FunctionCallMode::Force(name)) => {
            out.push_str(&format!("You must call the function \"{}\".", name));
        }
        _ => out.push_str("If no function is needed, answer normally in plain text."),
    }
    Some(out)
}

/// `text`, followed by a blank line and the instruction block when there is one.
pub fn with_function_instructions(
    text: &str,
    functions: &[FunctionDefinition],
    mode: Option<&FunctionCallMode>,
) -> String {
    match function_instructions(functions, mode) {
        Some(instructions) if text.is_empty() => instructions,
        Some(instructions) => format!("{}\n\n{}", text, instructions),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather() -> FunctionDefinition {
        FunctionDefinition::new("getWeather")
            .description("Current weather")
            .parameters(json!({"type": "object", "properties": {"location": {"type": "string"}}}))
    }

    #[test]
    fn test_instructions_list_definitions_and_envelope() {
        let text = function_instructions(&[weather()], Some(&FunctionCallMode::Auto)).unwrap();
        assert!(text.contains("\"getWeather\""));
        assert!(text.contains("\"location\""));
        assert!(text.contains(r#"{"function_call": {"name""#));
        assert!(text.contains("answer normally"));
    }

    #[test]
    fn test_forced_function_is_named() {
        let text =
            function_instructions(&[weather()], Some(&FunctionCallMode::Force("getWeather".into())))
                .unwrap();
        assert!(text.contains("You must call the function \"getWeather\""));
    }

    #[test]
    fn test_forbid_or_empty_yields_nothing() {
        assert!(function_instructions(&[weather()], Some(&FunctionCallMode::Forbid)).is_none());
        assert!(function_instructions(&[], None).is_none());
        assert_eq!(with_function_instructions("hi", &[], None), "hi");
    }

    #[test]
    fn test_appended_after_blank_line() {
        let out = with_function_instructions("What's the weather?", &[weather()], None);
        assert!(out.starts_with("What's the weather?\n\nYou have access"));
    }
}
