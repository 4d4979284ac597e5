//! Value coercion and schema validation for config writes.
//!
//! Clients frequently send arrays as JSON text or as a bare scalar. `coerce`
//! normalizes those shapes; `validate` then checks the result against the
//! declared type of the key.

use serde_json::{Number, Value as JsonValue};

use crate::error::{McpError, Result};

/// Config keys with a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    /// Directories the tool handlers may touch.
    AllowedDirectories,
    /// Commands the process tools refuse to run.
    BlockedCommands,
    /// Shell used for command execution.
    DefaultShell,
    /// Maximum lines returned by a single file read.
    FileReadLineLimit,
    /// Maximum lines accepted by a single file write.
    FileWriteLineLimit,
    /// Whether usage telemetry is sent.
    TelemetryEnabled,
    /// Anonymous client identifier.
    ClientId,
}

/// Shape a key's stored value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    List,
    Count,
    Flag,
    Any,
}

impl ConfigKey {
    /// All keys with a declared type.
    pub const ALL: [ConfigKey; 7] = [
        ConfigKey::AllowedDirectories,
        ConfigKey::BlockedCommands,
        ConfigKey::DefaultShell,
        ConfigKey::FileReadLineLimit,
        ConfigKey::FileWriteLineLimit,
        ConfigKey::TelemetryEnabled,
        ConfigKey::ClientId,
    ];

    /// Look up a key by its document name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Name of the key in the persisted document.
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::AllowedDirectories => "allowedDirectories",
            ConfigKey::BlockedCommands => "blockedCommands",
            ConfigKey::DefaultShell => "defaultShell",
            ConfigKey::FileReadLineLimit => "fileReadLineLimit",
            ConfigKey::FileWriteLineLimit => "fileWriteLineLimit",
            ConfigKey::TelemetryEnabled => "telemetryEnabled",
            ConfigKey::ClientId => "clientId",
        }
    }

    /// Declared value shape.
    pub fn kind(self) -> ValueKind {
        match self {
            ConfigKey::AllowedDirectories | ConfigKey::BlockedCommands => ValueKind::List,
            ConfigKey::DefaultShell | ConfigKey::ClientId => ValueKind::Text,
            ConfigKey::FileReadLineLimit | ConfigKey::FileWriteLineLimit => ValueKind::Count,
            ConfigKey::TelemetryEnabled => ValueKind::Flag,
        }
    }

    /// Whether the stored value is always an array of strings.
    pub fn is_array_typed(self) -> bool {
        self.kind() == ValueKind::List
    }
}

/// Declared shape for an arbitrary key name. Unknown keys are free-form.
pub fn kind_of(key: &str) -> ValueKind {
    ConfigKey::from_name(key).map_or(ValueKind::Any, ConfigKey::kind)
}

/// A validated config value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Text(String),
    List(Vec<String>),
    Number(Number),
    Flag(bool),
    Json(JsonValue),
}

impl ConfigValue {
    /// Convert back to the document representation.
    pub fn into_json(self) -> JsonValue {
        match self {
            ConfigValue::Text(s) => JsonValue::String(s),
            ConfigValue::List(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::String).collect())
            }
            ConfigValue::Number(n) => JsonValue::Number(n),
            ConfigValue::Flag(b) => JsonValue::Bool(b),
            ConfigValue::Json(v) => v,
        }
    }
}

/// Normalize a raw write input for `key`.
///
/// Strings that start with `[` or `{` are parsed as JSON when possible. For
/// array-typed keys the result is then forced into an array: strings are
/// parsed as a JSON array or wrapped whole, `null` becomes `[]`, anything else
/// becomes a one-element array of its string form.
pub fn coerce(key: &str, raw: JsonValue) -> JsonValue {
    let value = match raw {
        JsonValue::String(s) if s.starts_with('[') || s.starts_with('{') => {
            match serde_json::from_str::<JsonValue>(&s) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::debug!("Keeping '{}' as a string, not valid JSON: {}", key, e);
                    JsonValue::String(s)
                }
            }
        }
        other => other,
    };

    if kind_of(key) != ValueKind::List {
        return value;
    }

    match value {
        JsonValue::Array(items) => JsonValue::Array(items),
        JsonValue::String(s) => match serde_json::from_str::<JsonValue>(&s) {
            Ok(JsonValue::Array(items)) => JsonValue::Array(items),
            _ => JsonValue::Array(vec![JsonValue::String(s)]),
        },
        JsonValue::Null => JsonValue::Array(Vec::new()),
        other => JsonValue::Array(vec![JsonValue::String(scalar_text(&other))]),
    }
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Check a coerced value against the declared schema for `key`.
pub fn validate(key: &str, value: JsonValue) -> Result<ConfigValue> {
    if key.trim().is_empty() {
        return Err(invalid(key, "key must not be empty"));
    }

    match kind_of(key) {
        ValueKind::List => {
            let JsonValue::Array(items) = value else {
                return Err(invalid(key, "expected an array of strings"));
            };
            items
                .into_iter()
                .map(|item| match item {
                    JsonValue::String(s) => Ok(s),
                    other => Err(invalid(
                        key,
                        &format!("array elements must be strings, got {}", other),
                    )),
                })
                .collect::<Result<Vec<_>>>()
                .map(ConfigValue::List)
        }
        ValueKind::Text => match value {
            JsonValue::String(s) => Ok(ConfigValue::Text(s)),
            _ => Err(invalid(key, "expected a string")),
        },
        ValueKind::Count => match value {
            JsonValue::Number(n) if n.is_u64() => Ok(ConfigValue::Number(n)),
            _ => Err(invalid(key, "expected a non-negative integer")),
        },
        ValueKind::Flag => match value {
            JsonValue::Bool(b) => Ok(ConfigValue::Flag(b)),
            _ => Err(invalid(key, "expected a boolean")),
        },
        ValueKind::Any => Ok(ConfigValue::Json(value)),
    }
}

fn invalid(key: &str, reason: &str) -> McpError {
    McpError::ValidationFailed {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_array_string_is_parsed() {
        let value = coerce("allowedDirectories", json!("[\"/tmp\",\"/home\"]"));
        assert_eq!(value, json!(["/tmp", "/home"]));
    }

    #[test]
    fn test_bare_string_is_wrapped() {
        assert_eq!(coerce("blockedCommands", json!("rm")), json!(["rm"]));
    }

    #[test]
    fn test_malformed_bracket_string_is_wrapped_whole() {
        assert_eq!(
            coerce("allowedDirectories", json!("[/tmp")),
            json!(["[/tmp"])
        );
    }

    #[test]
    fn test_null_becomes_empty_array() {
        assert_eq!(coerce("blockedCommands", JsonValue::Null), json!([]));
    }

    #[test]
    fn test_scalars_become_single_string() {
        assert_eq!(coerce("blockedCommands", json!(42)), json!(["42"]));
        assert_eq!(coerce("blockedCommands", json!(true)), json!(["true"]));
        assert_eq!(
            coerce("allowedDirectories", json!("{\"a\":1}")),
            json!(["{\"a\":1}"])
        );
    }

    #[test]
    fn test_non_array_json_string_wraps_original_text() {
        assert_eq!(coerce("blockedCommands", json!("\"rm\"")), json!(["\"rm\""]));
        assert_eq!(coerce("blockedCommands", json!("7")), json!(["7"]));
    }

    #[test]
    fn test_free_form_keys_parse_objects() {
        assert_eq!(coerce("extra", json!("{\"a\":1}")), json!({"a": 1}));
        assert_eq!(coerce("extra", json!("{broken")), json!("{broken"));
        assert_eq!(coerce("defaultShell", json!("/bin/zsh")), json!("/bin/zsh"));
    }

    #[test]
    fn test_validate_rejects_non_string_elements() {
        let err = validate("allowedDirectories", json!(["/tmp", 3])).unwrap_err();
        assert!(matches!(err, McpError::ValidationFailed { .. }));
    }

    #[test]
    fn test_validate_declared_types() {
        assert_eq!(
            validate("defaultShell", json!("/bin/bash")).unwrap(),
            ConfigValue::Text("/bin/bash".to_string())
        );
        assert!(validate("defaultShell", json!(5)).is_err());
        assert!(validate("fileReadLineLimit", json!(1000)).is_ok());
        assert!(validate("fileReadLineLimit", json!(-1)).is_err());
        assert!(validate("fileReadLineLimit", json!("1000")).is_err());
        assert!(validate("telemetryEnabled", json!(false)).is_ok());
        assert!(validate("telemetryEnabled", json!("no")).is_err());
        assert!(validate("anything", json!({"nested": [1, 2]})).is_ok());
        assert!(validate("", json!(1)).is_err());
    }

    #[test]
    fn test_key_lookup() {
        assert_eq!(
            ConfigKey::from_name("blockedCommands"),
            Some(ConfigKey::BlockedCommands)
        );
        assert!(ConfigKey::BlockedCommands.is_array_typed());
        assert!(!ConfigKey::DefaultShell.is_array_typed());
        assert_eq!(ConfigKey::from_name("unknown"), None);
    }
}
