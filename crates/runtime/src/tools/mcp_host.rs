//! Tool host backed by an MCP provider process.

use std::sync::Arc;

use mcp::{CallToolResult, ProviderConfig, RpcSession, SessionConfig, ToolRegistry};
use serde_json::Value;
use tracing::debug;

use super::{ToolError, ToolHost};
use crate::model::{ToolCall, ToolSpec};

/// Tool host that forwards calls to a provider through its [`ToolRegistry`].
pub struct McpToolHost {
    registry: ToolRegistry,
    specs: Vec<ToolSpec>,
}

impl McpToolHost {
    /// Spawn the provider, run the handshake and cache its tools.
    pub async fn spawn(provider: &ProviderConfig, config: SessionConfig) -> mcp::Result<Self> {
        let session = Arc::new(RpcSession::spawn(provider, config).await?);
        match Self::connect(session.clone()).await {
            Ok(host) => Ok(host),
            Err(e) => {
                let _ = session.shutdown().await;
                Err(e)
            }
        }
    }

    /// Initialize an already-connected session and discover its tools.
    pub async fn connect(session: Arc<RpcSession>) -> mcp::Result<Self> {
        session.initialize().await?;
        let registry = ToolRegistry::discover(session).await?;
        Ok(Self::from_registry(registry))
    }

    pub fn from_registry(registry: ToolRegistry) -> Self {
        let specs = registry
            .tools()
            .iter()
            .cloned()
            .map(ToolSpec::from)
            .collect();
        Self { registry, specs }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Tear down the provider session. Safe to call more than once.
    pub async fn shutdown(&self) {
        debug!(provider = %self.registry.session().name(), "stopping tool provider");
        let _ = self.registry.session().shutdown().await;
    }
}

impl ToolHost for McpToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        self.registry
            .invoke(&call.name, call.input.clone())
            .await
            .map(flatten_content)
            .map_err(ToolError::from)
    }

    fn is_available(&self) -> bool {
        !self.registry.session().is_closed()
    }
}

/// Reduce a text-only `CallToolResult` to its text; anything else passes
/// through untouched.
fn flatten_content(result: Value) -> Value {
    if result.get("content").is_none() {
        return result;
    }
    match serde_json::from_value::<CallToolResult>(result.clone()) {
        Ok(parsed) if parsed.content.iter().all(|c| c.as_text().is_some()) => {
            Value::String(parsed.joined_text())
        }
        _ => result,
    }
}

impl From<mcp::Error> for ToolError {
    fn from(err: mcp::Error) -> Self {
        match err {
            mcp::Error::UnknownTool(name) => ToolError::NotFound(name),
            mcp::Error::Remote(e) => ToolError::Remote {
                code: e.code,
                message: e.message,
            },
            mcp::Error::Timeout { method } => ToolError::Timeout(method),
            mcp::Error::Cancelled => ToolError::Cancelled,
            mcp::Error::Transport(reason) | mcp::Error::Framing(reason) => {
                ToolError::Transport(reason)
            }
            mcp::Error::Serialize(e) => ToolError::InvalidInput(e.to_string()),
            other => ToolError::Execution(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_content_is_flattened() {
        let result = json!({
            "content": [{"type": "text", "text": "2024-03-26 15:30:45"}],
            "isError": false
        });
        assert_eq!(flatten_content(result), json!("2024-03-26 15:30:45"));
    }

    #[test]
    fn bare_and_mixed_results_pass_through() {
        assert_eq!(flatten_content(json!("15:30")), json!("15:30"));

        let mixed = json!({"content": [
            {"type": "text", "text": "chart"},
            {"type": "image", "data": "AAAA", "mimeType": "image/png"}
        ]});
        assert_eq!(flatten_content(mixed.clone()), mixed);
    }

    #[test]
    fn mcp_errors_map_to_tool_errors() {
        assert_eq!(
            ToolError::from(mcp::Error::UnknownTool("get_weather".into())),
            ToolError::NotFound("get_weather".into())
        );
        assert!(ToolError::from(mcp::Error::Transport("eof".into())).is_fatal());
        assert!(ToolError::from(mcp::Error::Cancelled).is_fatal());
        assert!(!ToolError::from(mcp::Error::Timeout { method: "tools/call".into() }).is_fatal());
    }
}
