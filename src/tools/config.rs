//! Configuration tools.
//!
//! Tools: get_config, set_config_value

use serde_json::{Map, Value as JsonValue};

use crate::config::{default_shell, WriteOutcome};
use crate::convert::{get_string_arg, get_value_arg, text_content};
use crate::error::{McpError, Result};
use crate::schema;
use crate::session::McpSession;
use crate::tools::{ToolDef, ToolOutput};

/// Get all configuration tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "get_config",
            "Get the complete server configuration as JSON, including the connected \
             client and basic system information.",
            schema!(object {}),
        ),
        ToolDef::new(
            "set_config_value",
            "Set a specific configuration value by key. allowedDirectories and \
             blockedCommands always store an array of strings; a JSON array string \
             or a single value is accepted and normalized.",
            schema!(object {
                required: { "key": string, "value": any }
            }),
        ),
    ]
}

/// Dispatch a configuration tool call.
pub async fn dispatch(
    session: &mut McpSession,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<ToolOutput> {
    match name {
        "get_config" => {
            let snapshot = config_snapshot(session);
            let text = format!(
                "Current configuration:\n{}",
                serde_json::to_string_pretty(&snapshot)?
            );
            Ok(ToolOutput::new(text_content(text, false)))
        }

        "set_config_value" => {
            let key = get_string_arg(&args, "key")?;
            let value = get_value_arg(&args, "value")?;

            let store = session.config_mut();
            let outcome = store.write(&key, value).await?;
            let stored = store.get(&key).cloned().unwrap_or(JsonValue::Null);
            let notice = format!("Configuration '{}' updated", key);

            let result = match outcome {
                WriteOutcome::Saved => text_content(
                    format!(
                        "Successfully set {} to {}\n\nUpdated configuration:\n{}",
                        key,
                        serde_json::to_string_pretty(&stored)?,
                        serde_json::to_string_pretty(store.read())?
                    ),
                    false,
                ),
                WriteOutcome::Unsaved { reason } => text_content(
                    format!(
                        "Value changed in memory but couldn't be saved to disk: {}",
                        reason
                    ),
                    true,
                ),
            };
            Ok(ToolOutput::new(result).with_notice(notice))
        }

        _ => Err(McpError::UnknownTool(name.to_string())),
    }
}

fn config_snapshot(session: &McpSession) -> JsonValue {
    let mut snapshot = session.config().read().clone();
    snapshot.insert(
        "currentClient".to_string(),
        serde_json::to_value(session.client()).unwrap_or(JsonValue::Null),
    );
    snapshot.insert("systemInfo".to_string(), system_info());
    JsonValue::Object(snapshot)
}

fn system_info() -> JsonValue {
    let platform = std::env::consts::OS;
    let platform_name = match platform {
        "windows" => "Windows",
        "macos" => "macOS",
        "linux" => "Linux",
        other => other,
    };
    serde_json::json!({
        "platform": platform,
        "platformName": platform_name,
        "defaultShell": default_shell(),
        "pathSeparator": std::path::MAIN_SEPARATOR.to_string(),
        "isWindows": cfg!(windows),
        "isMacOS": cfg!(target_os = "macos"),
        "isLinux": cfg!(target_os = "linux"),
    })
}
