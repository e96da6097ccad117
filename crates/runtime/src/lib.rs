//! Toolbridge runtime: conversation state, model backends and the tool loop.
//!
//! # Overview
//!
//! - **Session**: owns the conversation and runs the loop that alternates
//!   model calls with tool dispatch until the model gives a final answer.
//! - **Backend**: a trait abstracting the model API (Anthropic, or a
//!   scripted mock in tests).
//! - **ToolHost**: a trait abstracting where tools run. [`McpToolHost`]
//!   forwards calls to a provider process over JSON-RPC.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ProviderConfig, SessionConfig};
//! use runtime::{AnthropicBackend, McpToolHost, Session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = AnthropicBackend::builder("sk-ant-api03-...", "claude-sonnet-4-20250514").build();
//! let provider = ProviderConfig::from_command_line("clock", "clock-provider")?;
//! let tools = McpToolHost::spawn(&provider, SessionConfig::default()).await?;
//!
//! let mut session = Session::new(backend, tools);
//! let answer = session.chat("What time is it?").await?;
//! println!("{}", answer.text);
//!
//! session.tools().shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod conversation;
mod error;
pub mod model;
pub mod providers;
mod session;
pub mod tools;

pub use conversation::{Conversation, Turn};
pub use error::{Error, Result};
pub use model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Reply, Role, ToolCall,
    ToolOutcome, ToolResult, ToolSpec, Usage,
};
pub use providers::{AnthropicBackend, AnthropicBackendBuilder};
pub use session::{Answer, DEFAULT_MAX_ITERATIONS, Invocation, Session};
pub use tools::{McpToolHost, ToolError, ToolHost};
