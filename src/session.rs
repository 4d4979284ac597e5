//! MCP session state.
//!
//! Holds the configuration store and what the client told us about itself in
//! `initialize`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::config::ConfigStore;

/// Client identity from the `initialize` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// MCP session state.
pub struct McpSession {
    config: ConfigStore,
    client: Option<ClientInfo>,
}

impl McpSession {
    /// Create a session around an already loaded store.
    pub fn new(config: ConfigStore) -> Self {
        Self {
            config,
            client: None,
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigStore {
        &mut self.config
    }

    /// The connected client, once `initialize` has been handled.
    pub fn client(&self) -> Option<&ClientInfo> {
        self.client.as_ref()
    }

    /// Record `clientInfo` from `initialize` params. Missing or malformed info
    /// leaves the client unknown.
    pub fn record_client(&mut self, params: Option<&JsonValue>) {
        self.client = params
            .and_then(|p| p.get("clientInfo"))
            .and_then(|info| serde_json::from_value(info.clone()).ok());
        if let Some(client) = &self.client {
            tracing::info!("Client connected: {}", client.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_client() {
        let mut session = McpSession::new(ConfigStore::new("unused.json"));
        assert!(session.client().is_none());

        session.record_client(Some(&json!({
            "protocolVersion": "2024-11-05",
            "clientInfo": {"name": "claude-ai", "version": "0.1.0"}
        })));
        assert_eq!(session.client().map(|c| c.name.as_str()), Some("claude-ai"));

        session.record_client(Some(&json!({"clientInfo": "bogus"})));
        assert!(session.client().is_none());
    }
}
