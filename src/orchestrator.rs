//! Startup sequence.
//!
//! Loads the configuration, builds the gated channel, and hands the server to
//! the supervisor. Nothing here touches stdin/stdout directly, so the whole
//! sequence can run against in-memory pipes.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::channel::GatedChannel;
use crate::config::ConfigStore;
use crate::error::Result;
use crate::protocol::{JsonRpcNotification, LogLevel};
use crate::server::McpServer;
use crate::session::McpSession;
use crate::supervisor::{FaultReporter, Supervisor};

/// Builds and connects the server.
pub struct Orchestrator {
    config_path: PathBuf,
    reporter: Option<Arc<dyn FaultReporter>>,
}

impl Orchestrator {
    /// Orchestrator for the document at `config_path`.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            reporter: None,
        }
    }

    /// Send fatal faults to an external diagnostics collaborator.
    pub fn with_reporter(mut self, reporter: Arc<dyn FaultReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Load config, connect the channel and start serving.
    ///
    /// An `Err` means the server never came up; the caller should emit a
    /// startup failure notification. On success the returned supervisor owns
    /// the running server.
    pub async fn start<R, W>(self, reader: R, writer: W) -> Result<Supervisor>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut store = ConfigStore::new(self.config_path);
        tracing::info!("Loading configuration from {}", store.path().display());
        store.load().await;
        match store.load_error() {
            Some(err) => {
                tracing::error!("Failed to load configuration: {}", err);
                tracing::warn!("Continuing with in-memory configuration only");
            }
            None => tracing::info!("Configuration loaded successfully"),
        }

        let mut supervisor = Supervisor::new();
        if let Some(reporter) = self.reporter {
            supervisor = supervisor.with_reporter(reporter);
        }

        let channel = Arc::new(GatedChannel::new(reader, writer).with_fault_sink(supervisor.sink()));

        tracing::info!("Connecting server...");
        channel.attach()?;

        let mut server = McpServer::new(McpSession::new(store), channel.clone());
        let gate = channel;
        server.on_initialized(move || {
            gate.open();
        });
        supervisor.spawn(async move { server.run().await });
        tracing::info!("Server connected successfully");

        Ok(supervisor)
    }
}

/// Write the startup failure notification straight to `writer`.
///
/// Best effort: a failed write is logged and otherwise ignored.
pub async fn report_startup_failure<W>(writer: &mut W, message: &str)
where
    W: AsyncWrite + Unpin,
{
    tracing::error!("FATAL ERROR: {}", message);
    let data = format!(
        "Failed to start server: {} ({})",
        message,
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    );
    let notification = JsonRpcNotification::log(LogLevel::Error, &data);

    let write = async {
        let mut line = serde_json::to_string(&notification)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Result::Ok(())
    };
    if let Err(e) = write.await {
        tracing::error!("Could not write startup failure notification: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as JsonValue};
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn test_startup_failure_notification_shape() {
        let mut out = Vec::new();
        report_startup_failure(&mut out, "stdout closed").await;

        let line = String::from_utf8(out).unwrap();
        let value: JsonValue = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["jsonrpc"], json!("2.0"));
        assert_eq!(value["method"], json!("notifications/message"));
        assert_eq!(value["params"]["level"], json!("error"));
        assert_eq!(value["params"]["logger"], json!("desktop-commander"));
        let data = value["params"]["data"].as_str().unwrap();
        assert!(data.starts_with("Failed to start server: stdout closed ("));
    }

    #[tokio::test]
    async fn test_start_survives_missing_config_and_serves() {
        let dir = tempfile::tempdir().unwrap();
        let (client, server_io) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (client_read, mut client_write) = tokio::io::split(client);

        let supervisor = Orchestrator::new(dir.path().join("missing").join("config.json"))
            .start(server_read, server_write)
            .await
            .unwrap();
        let running = tokio::spawn(supervisor.run());

        client_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
            .await
            .unwrap();
        let mut lines = BufReader::new(client_read).lines();
        let reply: JsonValue = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply["id"], json!(1));

        client_write.shutdown().await.unwrap();
        assert!(running.await.unwrap().is_ok());
    }
}
