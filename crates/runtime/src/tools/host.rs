//! The seam between the orchestration loop and whatever runs tools.

use crate::model::{ToolCall, ToolSpec};
use crate::tools::ToolError;
use serde_json::Value;
use std::future::Future;

/// Something that can list and run tools on behalf of the model.
pub trait ToolHost: Send + Sync {
    /// Tools to advertise to the model on every request.
    fn specs(&self) -> &[ToolSpec];

    /// Run one tool call and return its raw result payload.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = Result<Value, ToolError>> + Send;

    /// Whether calls can still reach the tools. A host backed by a dead
    /// provider reports `false` and should be replaced.
    fn is_available(&self) -> bool {
        true
    }
}
