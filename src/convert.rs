//! Argument extraction and MCP content helpers.

use serde_json::{Map, Value as JsonValue};

use crate::error::{McpError, Result};

/// Helper to get a required string argument from JSON arguments.
pub fn get_string_arg(args: &Map<String, JsonValue>, name: &str) -> Result<String> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| McpError::MissingArg(name.to_string()))
}

/// Helper to get a required argument of any JSON type.
///
/// An explicit `null` counts as present.
pub fn get_value_arg(args: &Map<String, JsonValue>, name: &str) -> Result<JsonValue> {
    args.get(name)
        .cloned()
        .ok_or_else(|| McpError::MissingArg(name.to_string()))
}

/// Wrap text in an MCP tool result.
pub fn text_content(text: impl Into<String>, is_error: bool) -> JsonValue {
    let mut result = serde_json::json!({
        "content": [{
            "type": "text",
            "text": text.into()
        }]
    });
    if is_error {
        result["isError"] = JsonValue::Bool(true);
    }
    result
}
