use thiserror::Error;

use crate::model::ModelError;
use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A tool failure that ended the turn: the provider is gone.
    #[error("tool error: {0}")]
    Tool(ToolError),

    #[error("stopped after {limit} model calls without a final answer")]
    LoopLimitExceeded { limit: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
