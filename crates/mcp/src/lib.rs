//! MCP (Model Context Protocol) client library.
//!
//! This crate talks newline-delimited JSON-RPC to a tool provider process
//! over stdio.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp::{ProviderConfig, RpcSession, SessionConfig, ToolRegistry};
//!
//! # async fn example() -> mcp::Result<()> {
//! let provider = ProviderConfig::from_command_line("clock", "clock-provider")?;
//! let session = Arc::new(RpcSession::spawn(&provider, SessionConfig::default()).await?);
//! session.initialize().await?;
//!
//! let registry = ToolRegistry::discover(session.clone()).await?;
//! for tool in registry.tools() {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = registry
//!     .invoke("get_current_time", serde_json::json!({}))
//!     .await?;
//! println!("{result}");
//!
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod protocol;
mod registry;
mod session;
pub mod transport;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, Implementation, Incoming, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId,
    ServerCapabilities, Tool, ToolContent, ToolsCapability,
};
pub use registry::ToolRegistry;
pub use session::{DEFAULT_TIMEOUT, Notification, ProviderConfig, RpcSession, SessionConfig};
pub use transport::{FrameReader, FrameWriter, MAX_MESSAGE_SIZE, framed};
