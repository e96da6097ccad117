//! MCP error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn provider: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("invalid provider command: {0}")]
    InvalidCommand(String),

    /// The stream closed mid-message or carried something that is not JSON.
    #[error("framing error: {0}")]
    Framing(String),

    /// The transport to the provider is broken; the session cannot be reused.
    #[error("transport error: {0}")]
    Transport(String),

    /// The session was torn down while the call was pending.
    #[error("call cancelled: session shut down")]
    Cancelled,

    #[error("timeout waiting for response to '{method}'")]
    Timeout { method: String },

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A response nobody was waiting for, or a message of unknown shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The provider answered with a JSON-RPC error object.
    #[error("remote error: {0}")]
    Remote(#[from] JsonRpcError),

    #[error("tool not found: {0}")]
    UnknownTool(String),

    /// The provider returned a malformed tool list.
    #[error("registry error: {0}")]
    Registry(String),
}

impl Error {
    /// Whether this error leaves the session unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Framing(_) | Error::Cancelled | Error::Spawn(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
