//! Tool execution: the host seam and its MCP-backed implementation.

pub mod errors;
mod host;
mod mcp_host;

pub use errors::ToolError;
pub use host::ToolHost;
pub use mcp_host::McpToolHost;
