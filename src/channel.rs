//! Line-delimited transport with handshake gating.
//!
//! MCP forbids server-initiated notifications before the client has sent
//! `notifications/initialized`. The channel enforces that: while gated,
//! responses flow normally and notifications are dropped. Once opened the gate
//! never closes again, and dropped notifications are not replayed.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

use crate::error::{McpError, Result};
use crate::protocol::{parse_frame, Inbound, JsonRpcNotification, JsonRpcResponse, LogLevel};
use crate::supervisor::FaultSink;

/// Gate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    /// Not yet attached to the peer.
    Connecting = 0,
    /// Attached; notifications are dropped.
    Gated = 1,
    /// Handshake complete; notifications are delivered.
    Open = 2,
}

impl ChannelState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ChannelState::Connecting,
            1 => ChannelState::Gated,
            _ => ChannelState::Open,
        }
    }
}

/// Handshake-gated JSON-RPC channel.
pub struct GatedChannel<R = Stdin, W = Stdout> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<W>,
    state: AtomicU8,
    faults: Option<FaultSink>,
}

impl<R, W> GatedChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a channel in the `Connecting` state.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(writer),
            state: AtomicU8::new(ChannelState::Connecting as u8),
            faults: None,
        }
    }

    /// Report malformed frames to the fault boundary.
    pub fn with_fault_sink(mut self, sink: FaultSink) -> Self {
        self.faults = Some(sink);
        self
    }

    /// Current gate position.
    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Attach to the peer: `Connecting` → `Gated`.
    pub fn attach(&self) -> Result<()> {
        self.state
            .compare_exchange(
                ChannelState::Connecting as u8,
                ChannelState::Gated as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|current| {
                McpError::Protocol(format!(
                    "channel cannot attach from state {:?}",
                    ChannelState::from_u8(current)
                ))
            })
    }

    /// Lift the gate: `Gated` → `Open`.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn open(&self) -> bool {
        let opened = self
            .state
            .compare_exchange(
                ChannelState::Gated as u8,
                ChannelState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if opened {
            tracing::info!("Client initialization complete, notifications enabled");
        }
        opened
    }

    /// Next well-formed message, or `None` at end of input.
    ///
    /// Malformed lines are logged, reported as framing faults and skipped.
    pub async fn read_message(&self) -> Result<Option<Inbound>> {
        let mut reader = self.reader.lock().await;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(None);
            }

            let parsed = std::str::from_utf8(&buf)
                .map_err(|e| McpError::FramingFault(format!("line is not valid UTF-8: {}", e)))
                .map(str::trim);
            let frame = match parsed {
                Ok("") => continue,
                Ok(frame) => frame,
                Err(fault) => {
                    self.discard(fault, &String::from_utf8_lossy(&buf));
                    continue;
                }
            };

            match parse_frame(frame) {
                Ok(message) => return Ok(Some(message)),
                Err(fault) => self.discard(fault, frame),
            }
        }
    }

    fn discard(&self, fault: McpError, frame: &str) {
        tracing::warn!("Ignoring malformed frame: {}", fault);
        tracing::debug!("Malformed frame contents: {}", frame.trim());
        if let Some(sink) = &self.faults {
            sink.report(fault);
        }
    }

    /// Send a direct response. Responses are never gated.
    pub async fn send_response(&self, response: &JsonRpcResponse) -> Result<()> {
        self.write_frame(response).await
    }

    /// Send a notification if the gate is open.
    ///
    /// Returns whether the notification was written.
    pub async fn send_notification(&self, method: &str, params: Option<JsonValue>) -> Result<bool> {
        self.send_gated(JsonRpcNotification::new(method, params)).await
    }

    /// Send a `notifications/message` log entry if the gate is open.
    pub async fn send_log(&self, level: LogLevel, data: &str) -> Result<bool> {
        self.send_gated(JsonRpcNotification::log(level, data)).await
    }

    async fn send_gated(&self, notification: JsonRpcNotification) -> Result<bool> {
        if self.state() != ChannelState::Open {
            tracing::debug!(
                "Dropping '{}' notification before client initialization",
                notification.method
            );
            return Ok(false);
        }
        self.write_frame(&notification).await?;
        Ok(true)
    }

    async fn write_frame<T: Serialize>(&self, frame: &T) -> Result<()> {
        let mut json = serde_json::to_string(frame)?;
        json.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Consume the channel, returning the underlying reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader.into_inner().into_inner(), self.writer.into_inner())
    }
}
