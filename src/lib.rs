//! # desktop-commander-mcp
//!
//! Configuration store and handshake-gated stdio transport for the Desktop
//! Commander MCP server.
//!
//! The server speaks JSON-RPC 2.0 over stdin/stdout. Two pieces carry the
//! interesting invariants:
//!
//! - **[`ConfigStore`]**: a small JSON settings document. Writes are coerced
//!   (array-typed keys such as `allowedDirectories` always end up as string
//!   arrays), validated, applied in memory and then saved. A failed save is a
//!   partial success, never a crash.
//! - **[`GatedChannel`]**: the line transport. Server-initiated notifications
//!   are dropped until the client sends `notifications/initialized`, after
//!   which they flow permanently. Malformed lines are skipped as noise.
//!
//! ## Usage
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "desktop-commander": {
//!       "command": "/path/to/desktop-commander",
//!       "args": []
//!     }
//!   }
//! }
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use desktop_commander::Orchestrator;
//!
//! # async fn example() -> desktop_commander::Result<()> {
//! let supervisor = Orchestrator::new("/tmp/config.json")
//!     .start(tokio::io::stdin(), tokio::io::stdout())
//!     .await?;
//! supervisor.run().await
//! # }
//! ```

pub mod channel;
pub mod config;
mod convert;
mod error;
pub mod maintenance;
mod orchestrator;
pub mod protocol;
mod server;
mod session;
pub mod supervisor;
mod tools;

pub use channel::{ChannelState, GatedChannel};
pub use config::{ConfigStore, ServerConfig, WriteOutcome};
pub use error::{rpc_codes, McpError, Result};
pub use orchestrator::{report_startup_failure, Orchestrator};
pub use server::McpServer;
pub use session::{ClientInfo, McpSession};
pub use supervisor::{FaultReporter, Supervisor};
pub use tools::{ToolDef, ToolOutput, ToolRegistry};
