//! MCP server implementation.
//!
//! Handles JSON-RPC 2.0 over a [`GatedChannel`] according to the MCP protocol
//! specification.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tokio::io::{AsyncRead, AsyncWrite, Stdin, Stdout};

use crate::channel::GatedChannel;
use crate::error::{rpc_codes, Result};
use crate::protocol::{Inbound, JsonRpcResponse, LogLevel, SERVICE_NAME};
use crate::session::McpSession;
use crate::tools::ToolRegistry;

/// MCP protocol version we support.
const PROTOCOL_VERSION: &str = "2024-11-05";

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

type InitializedCallback = Box<dyn FnOnce() + Send>;

/// MCP server.
pub struct McpServer<R = Stdin, W = Stdout> {
    session: McpSession,
    registry: ToolRegistry,
    channel: Arc<GatedChannel<R, W>>,
    on_initialized: Option<InitializedCallback>,
}

impl<R, W> McpServer<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a new MCP server speaking over `channel`.
    pub fn new(session: McpSession, channel: Arc<GatedChannel<R, W>>) -> Self {
        Self {
            session,
            registry: ToolRegistry::new(),
            channel,
            on_initialized: None,
        }
    }

    /// Register the callback run once when the client completes initialization.
    pub fn on_initialized<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_initialized = Some(Box::new(callback));
    }

    pub fn session(&self) -> &McpSession {
        &self.session
    }

    /// Serve messages until the client closes the input stream.
    pub async fn run(&mut self) -> Result<()> {
        while let Some(message) = self.channel.read_message().await? {
            self.handle_message(message).await?;
        }
        tracing::info!("Client disconnected");
        Ok(())
    }

    async fn handle_message(&mut self, message: Inbound) -> Result<()> {
        match message {
            Inbound::Request { id, method, params } => {
                let (response, notice) = self.handle_request(id, &method, params).await;
                self.channel.send_response(&response).await?;
                if let Some(notice) = notice {
                    self.channel.send_log(LogLevel::Info, &notice).await?;
                }
            }
            Inbound::Notification { method, .. } => match method.as_str() {
                "notifications/initialized" | "initialized" => self.handle_initialized().await?,
                _ => tracing::debug!("Ignoring notification '{}'", method),
            },
            Inbound::Response { id } => {
                tracing::debug!("Ignoring client response to request {}", id);
            }
        }
        Ok(())
    }

    /// Handle a single JSON-RPC request. The second element is a log line for
    /// the client, if the call changed anything worth announcing.
    async fn handle_request(
        &mut self,
        id: JsonValue,
        method: &str,
        params: Option<JsonValue>,
    ) -> (JsonRpcResponse, Option<String>) {
        let id = Some(id);
        match method {
            "initialize" => (self.handle_initialize(id, params), None),
            "tools/list" => (self.handle_tools_list(id), None),
            "tools/call" => self.handle_tools_call(id, params).await,
            "ping" => (JsonRpcResponse::success(id, serde_json::json!({})), None),
            _ => (
                JsonRpcResponse::error(
                    id,
                    rpc_codes::METHOD_NOT_FOUND,
                    format!("Unknown method: {}", method),
                ),
                None,
            ),
        }
    }

    /// Handle the initialize request.
    fn handle_initialize(&mut self, id: Option<JsonValue>, params: Option<JsonValue>) -> JsonRpcResponse {
        self.session.record_client(params.as_ref());

        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "logging": {}
                },
                "serverInfo": {
                    "name": SERVICE_NAME,
                    "version": SERVER_VERSION
                }
            }),
        )
    }

    /// The client finished its side of the handshake.
    async fn handle_initialized(&mut self) -> Result<()> {
        let Some(callback) = self.on_initialized.take() else {
            tracing::debug!("Repeated initialized notification ignored");
            return Ok(());
        };
        callback();
        self.channel
            .send_log(LogLevel::Info, "MCP fully initialized, notifications enabled")
            .await?;
        Ok(())
    }

    /// Handle the tools/list request.
    fn handle_tools_list(&self, id: Option<JsonValue>) -> JsonRpcResponse {
        let tools: Vec<JsonValue> = self
            .registry
            .tools()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema
                })
            })
            .collect();

        JsonRpcResponse::success(id, serde_json::json!({ "tools": tools }))
    }

    /// Handle the tools/call request.
    async fn handle_tools_call(
        &mut self,
        id: Option<JsonValue>,
        params: Option<JsonValue>,
    ) -> (JsonRpcResponse, Option<String>) {
        let params = match params {
            Some(JsonValue::Object(obj)) => obj,
            _ => {
                return (
                    JsonRpcResponse::error(
                        id,
                        rpc_codes::INVALID_PARAMS,
                        "Missing params object".to_string(),
                    ),
                    None,
                )
            }
        };

        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n.to_string(),
            None => {
                return (
                    JsonRpcResponse::error(
                        id,
                        rpc_codes::INVALID_PARAMS,
                        "Missing 'name' in params".to_string(),
                    ),
                    None,
                )
            }
        };

        let arguments = match params.get("arguments") {
            Some(JsonValue::Object(obj)) => obj.clone(),
            Some(JsonValue::Null) | None => Map::new(),
            _ => {
                return (
                    JsonRpcResponse::error(
                        id,
                        rpc_codes::INVALID_PARAMS,
                        "'arguments' must be an object".to_string(),
                    ),
                    None,
                )
            }
        };

        match self.registry.dispatch(&mut self.session, &name, arguments).await {
            Ok(output) => (JsonRpcResponse::success(id, output.result), output.notice),
            Err(err) => {
                tracing::warn!("Tool {} failed: {}", name, err);
                (JsonRpcResponse::from_error(id, err), None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type TestChannel = GatedChannel<Cursor<Vec<u8>>, Vec<u8>>;

    fn server_with_input(lines: &[JsonValue]) -> (McpServer<Cursor<Vec<u8>>, Vec<u8>>, Arc<TestChannel>) {
        let input: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        let channel = Arc::new(GatedChannel::new(Cursor::new(input.into_bytes()), Vec::new()));
        channel.attach().unwrap();
        let session = McpSession::new(ConfigStore::new("unused-config.json"));
        (McpServer::new(session, channel.clone()), channel)
    }

    fn output(channel: Arc<TestChannel>) -> Vec<JsonValue> {
        let channel = Arc::try_unwrap(channel).unwrap_or_else(|_| panic!("channel still shared"));
        let (_, out) = channel.into_inner();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_initialize_records_client() {
        let (mut server, channel) = server_with_input(&[json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": PROTOCOL_VERSION, "clientInfo": {"name": "test-client"}}
        })]);
        server.run().await.unwrap();
        assert_eq!(server.session().client().map(|c| c.name.as_str()), Some("test-client"));
        drop(server);

        let lines = output(channel);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["result"]["serverInfo"]["name"], json!(SERVICE_NAME));
    }

    #[tokio::test]
    async fn test_initialized_callback_fires_once() {
        let (mut server, channel) = server_with_input(&[
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        ]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let gate = channel.clone();
        server.on_initialized(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            gate.open();
        });

        server.run().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        drop(server);

        let lines = output(channel);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["method"], json!("notifications/message"));
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let (mut server, channel) = server_with_input(&[
            json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {"requestId": 3}}),
            json!({"jsonrpc": "2.0", "id": 9, "result": {}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "nope"}),
        ]);
        server.run().await.unwrap();
        drop(server);

        let lines = output(channel);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["id"], json!(2));
        assert_eq!(lines[0]["error"]["code"], json!(rpc_codes::METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_tools_call_requires_name() {
        let (mut server, channel) = server_with_input(&[json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"arguments": {}}
        })]);
        server.run().await.unwrap();
        drop(server);

        let lines = output(channel);
        assert_eq!(lines[0]["error"]["code"], json!(rpc_codes::INVALID_PARAMS));
    }
}
