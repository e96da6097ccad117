use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("provider error [{code}]: {message}")]
    Remote { code: i32, message: String },
    #[error("provider did not answer '{0}' in time")]
    Timeout(String),
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("tool provider unavailable: {0}")]
    Transport(String),
    #[error("cancelled: tool provider shut down")]
    Cancelled,
}

impl ToolError {
    /// Whether the tool provider is gone, so the turn cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Cancelled)
    }
}
