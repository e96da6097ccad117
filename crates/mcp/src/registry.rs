//! Tool discovery and invocation over an [`RpcSession`].

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{CallToolParams, CallToolResult, JsonRpcError, Tool, codes, methods};
use crate::session::RpcSession;

/// The provider's tools, fetched once when the session starts.
pub struct ToolRegistry {
    session: Arc<RpcSession>,
    tools: Vec<Tool>,
}

impl ToolRegistry {
    /// Fetch the tool list from the provider.
    pub async fn discover(session: Arc<RpcSession>) -> Result<Self> {
        let result = session.call(methods::LIST_TOOLS, json!({})).await?;
        let tools = parse_tool_list(result)?;
        debug!(
            provider = %session.name(),
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "tools discovered"
        );
        Ok(Self { session, tools })
    }

    /// All known tools, in provider order.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn session(&self) -> &Arc<RpcSession> {
        &self.session
    }

    /// Call a tool by name.
    ///
    /// Names missing from the registry fail with [`Error::UnknownTool`]
    /// without reaching the provider.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value> {
        if self.get(name).is_none() {
            return Err(Error::UnknownTool(name.to_string()));
        }

        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result = self
            .session
            .call(methods::CALL_TOOL, serde_json::to_value(params)?)
            .await?;
        check_tool_error(result)
    }
}

fn parse_tool_list(result: Value) -> Result<Vec<Tool>> {
    let Value::Object(mut map) = result else {
        return Err(Error::Registry("tools/list result is not an object".to_string()));
    };
    let Some(Value::Array(raw_tools)) = map.remove("tools") else {
        return Err(Error::Registry("tools/list result missing tools array".to_string()));
    };

    let mut seen = HashSet::new();
    let mut tools = Vec::with_capacity(raw_tools.len());
    for (index, raw) in raw_tools.into_iter().enumerate() {
        let tool: Tool = serde_json::from_value(raw)
            .map_err(|e| Error::Registry(format!("tool #{index}: {e}")))?;
        if !seen.insert(tool.name.clone()) {
            return Err(Error::Registry(format!("duplicate tool name '{}'", tool.name)));
        }
        tools.push(tool);
    }
    Ok(tools)
}

/// Turn a structured result flagged `isError` into a remote error.
///
/// Results of any other shape are passed through untouched.
fn check_tool_error(result: Value) -> Result<Value> {
    let flagged = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !flagged {
        return Ok(result);
    }

    let message = serde_json::from_value::<CallToolResult>(result.clone())
        .map(|r| r.joined_text())
        .unwrap_or_else(|_| result.to_string());
    Err(Error::Remote(JsonRpcError {
        code: codes::INTERNAL_ERROR,
        message,
        data: Some(result),
    }))
}
