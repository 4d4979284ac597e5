//! JSON-RPC 2.0 message types and frame parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{McpError, Result};

/// Name reported as `logger` in log notifications and in `serverInfo`.
pub const SERVICE_NAME: &str = "desktop-commander";

/// Raw inbound JSON-RPC 2.0 message.
#[derive(Debug, Deserialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<JsonValue>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<JsonValue>,
    #[serde(default)]
    pub result: Option<JsonValue>,
    #[serde(default)]
    pub error: Option<JsonValue>,
}

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Call expecting a response.
    Request {
        id: JsonValue,
        method: String,
        params: Option<JsonValue>,
    },
    /// Fire-and-forget message from the client.
    Notification {
        method: String,
        params: Option<JsonValue>,
    },
    /// Client's answer to a server-initiated request.
    Response { id: JsonValue },
}

/// Parse one transport line into a message.
///
/// Anything that is not a JSON-RPC 2.0 request, notification or response is a
/// framing fault.
pub fn parse_frame(line: &str) -> Result<Inbound> {
    let msg: JsonRpcMessage =
        serde_json::from_str(line).map_err(|e| McpError::FramingFault(e.to_string()))?;

    if msg.jsonrpc != "2.0" {
        return Err(McpError::FramingFault(format!(
            "unsupported jsonrpc version '{}'",
            msg.jsonrpc
        )));
    }

    match (msg.method, msg.id) {
        (Some(method), Some(id)) => Ok(Inbound::Request {
            id,
            method,
            params: msg.params,
        }),
        (Some(method), None) => Ok(Inbound::Notification {
            method,
            params: msg.params,
        }),
        (None, Some(id)) if msg.result.is_some() || msg.error.is_some() => {
            Ok(Inbound::Response { id })
        }
        _ => Err(McpError::FramingFault(
            "message has neither a method nor a result".to_string(),
        )),
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<JsonValue>, result: JsonValue) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<JsonValue>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }

    /// Create an error response from an McpError.
    pub fn from_error(id: Option<JsonValue>, err: McpError) -> Self {
        Self::error(id, err.rpc_code(), err.to_string())
    }
}

/// JSON-RPC 2.0 notification sent by the server.
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
}

impl JsonRpcNotification {
    pub fn new(method: &str, params: Option<JsonValue>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }

    /// A `notifications/message` log entry.
    pub fn log(level: LogLevel, data: &str) -> Self {
        Self::new(
            "notifications/message",
            Some(serde_json::json!({
                "level": level,
                "logger": SERVICE_NAME,
                "data": data,
            })),
        )
    }
}

/// MCP logging levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}
