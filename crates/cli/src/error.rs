//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// `ANTHROPIC_API_KEY` is not set.
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    /// Configuration is unreadable or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The tool provider could not be started or discovered.
    #[error("tool provider: {0}")]
    Provider(#[from] mcp::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
