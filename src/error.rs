//! Error types for the MCP server.
//!
//! Every failure carries an explicit kind so callers (and the fault boundary)
//! can decide whether to recover, surface, or shut down.

use serde::{Deserialize, Serialize};

/// MCP server errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum McpError {
    /// The configuration document could not be loaded.
    #[error("failed to load configuration from {path}: {reason}")]
    LoadFailed {
        /// Document path
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// A config value was rejected by the key's declared schema.
    #[error("invalid value for '{key}': {reason}")]
    ValidationFailed {
        /// Config key being written
        key: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// The configuration document could not be written to disk.
    #[error("failed to save configuration to {path}: {reason}")]
    PersistFailed {
        /// Document path
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// A transport line was not a well-formed JSON-RPC message.
    #[error("malformed JSON frame: {0}")]
    FramingFault(String),

    /// Unrecoverable runtime fault.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Unknown tool requested.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArg(String),

    /// Invalid argument value.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArg {
        /// Argument name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// JSON-RPC protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Protocol(format!("JSON error: {}", err))
    }
}

/// JSON-RPC error codes.
pub mod rpc_codes {
    /// Parse error - Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params - Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error - Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

impl McpError {
    /// Convert to JSON-RPC error code.
    pub fn rpc_code(&self) -> i32 {
        match self {
            McpError::UnknownTool(_) => rpc_codes::METHOD_NOT_FOUND,
            McpError::MissingArg(_)
            | McpError::InvalidArg { .. }
            | McpError::ValidationFailed { .. } => rpc_codes::INVALID_PARAMS,
            McpError::Protocol(_) => rpc_codes::INVALID_REQUEST,
            McpError::FramingFault(_) => rpc_codes::PARSE_ERROR,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }

    /// Whether this fault is transport noise rather than a real failure.
    pub fn is_framing(&self) -> bool {
        matches!(self, McpError::FramingFault(_))
    }
}

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;
