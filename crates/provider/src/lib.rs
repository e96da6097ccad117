//! Clock tool provider.
//!
//! Serves a single `get_current_time` tool over newline-delimited JSON-RPC.
//! The binary wires [`ClockServer::serve`] to stdin/stdout; logs go to
//! stderr because stdout is the RPC channel.

use chrono::Local;
use mcp::protocol::{PROTOCOL_VERSION, codes, methods};
use mcp::{
    CallToolParams, CallToolResult, FrameWriter, Implementation, Incoming, InitializeResult,
    JsonRpcError, JsonRpcResponse, ListToolsResult, ServerCapabilities, Tool, ToolsCapability,
};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tracing::{debug, warn};

pub const SERVER_NAME: &str = "clock-provider";
pub const TOOL_NAME: &str = "get_current_time";
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time as `YYYY-MM-DD HH:MM:SS`.
pub fn local_time() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}

/// The tools this provider advertises.
pub fn tools() -> Vec<Tool> {
    vec![Tool {
        name: TOOL_NAME.to_string(),
        description: "Get the current date and time".to_string(),
        input_schema: json!({"type": "object", "properties": {}, "required": []}),
    }]
}

type Clock = Box<dyn Fn() -> String + Send + Sync>;

pub struct ClockServer {
    now: Clock,
}

impl Default for ClockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockServer {
    pub fn new() -> Self {
        Self::with_clock(local_time)
    }

    /// Use a custom time source.
    pub fn with_clock(now: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self { now: Box::new(now) }
    }

    /// Handle one decoded message, returning the response to send if any.
    ///
    /// Notifications and stray responses produce nothing.
    pub fn handle(&self, message: Value) -> Option<JsonRpcResponse> {
        match Incoming::from_value(message) {
            Ok(Incoming::Request { id, method, params }) => {
                debug!(%id, %method, "request");
                let response = match self.dispatch(&method, params) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(error) => {
                        warn!(%method, %error, "request failed");
                        JsonRpcResponse::failure(id, error)
                    }
                };
                Some(response)
            }
            Ok(Incoming::Notification { method, .. }) => {
                debug!(%method, "notification");
                None
            }
            Ok(Incoming::Response(response)) => {
                warn!(id = %response.id, "ignoring unsolicited response");
                None
            }
            Err(reason) => {
                warn!(%reason, "ignoring invalid message");
                None
            }
        }
    }

    fn dispatch(&self, method: &str, params: Value) -> Result<Value, JsonRpcError> {
        match method {
            methods::INITIALIZE => encode(&InitializeResult {
                protocol_version: Some(PROTOCOL_VERSION.to_string()),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability::default()),
                },
                server_info: Some(Implementation {
                    name: SERVER_NAME.to_string(),
                    version: Some(env!("CARGO_PKG_VERSION").to_string()),
                }),
            }),
            methods::LIST_TOOLS => encode(&ListToolsResult { tools: tools() }),
            methods::CALL_TOOL => {
                let params: CallToolParams = serde_json::from_value(params).map_err(|e| {
                    JsonRpcError::new(codes::INVALID_PARAMS, format!("Invalid params: {e}"))
                })?;
                if params.name != TOOL_NAME {
                    return Err(JsonRpcError::new(
                        codes::METHOD_NOT_FOUND,
                        format!("Unknown tool: {}", params.name),
                    ));
                }
                encode(&CallToolResult::text((self.now)()))
            }
            _ => Err(JsonRpcError::new(
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            )),
        }
    }

    /// Serve requests until the reader reaches end of input.
    ///
    /// Unparseable lines are answered with a parse error and skipped.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> mcp::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        let mut writer = FrameWriter::new(writer);

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| mcp::Error::Transport(format!("read failed: {e}")))?
        {
            if line.trim().is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "malformed request line");
                    writer
                        .send(&json!({
                            "jsonrpc": "2.0",
                            "id": null,
                            "error": {"code": codes::PARSE_ERROR, "message": format!("Parse error: {e}")}
                        }))
                        .await?;
                    continue;
                }
            };

            if let Some(response) = self.handle(message) {
                writer.send(&response).await?;
            }
        }

        debug!("input closed, stopping");
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::new(codes::INTERNAL_ERROR, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp::FrameReader;
    use tokio::io::{AsyncWriteExt, duplex};

    fn fixed() -> ClockServer {
        ClockServer::with_clock(|| "2024-03-26 15:30:45".to_string())
    }

    fn request(id: i64, method: &str, params: Value) -> Value {
        json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
    }

    #[test]
    fn initialize_reports_tool_capability() {
        let response = fixed().handle(request(1, "initialize", json!({}))).unwrap();
        let result = response.into_result().unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[test]
    fn lists_the_clock_tool() {
        let response = fixed().handle(request(2, "tools/list", json!({}))).unwrap();
        let result = response.into_result().unwrap();
        assert_eq!(result["tools"][0]["name"], TOOL_NAME);
        assert_eq!(result["tools"][0]["inputSchema"]["type"], "object");
    }

    #[test]
    fn call_returns_text_content() {
        let response = fixed()
            .handle(request(
                3,
                "tools/call",
                json!({"name": "get_current_time", "arguments": {}}),
            ))
            .unwrap();
        let result: CallToolResult =
            serde_json::from_value(response.into_result().unwrap()).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), "2024-03-26 15:30:45");
    }

    #[test]
    fn unknown_tool_and_method_are_rejected() {
        let server = fixed();
        let err = server
            .handle(request(4, "tools/call", json!({"name": "get_weather"})))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(err.code, codes::METHOD_NOT_FOUND);
        assert!(err.message.contains("get_weather"));

        let err = server
            .handle(request(5, "resources/list", json!({})))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(err.code, codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn notifications_get_no_reply() {
        let message = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(fixed().handle(message).is_none());
    }

    #[test]
    fn local_time_uses_expected_format() {
        let now = local_time();
        assert!(chrono::NaiveDateTime::parse_from_str(&now, TIME_FORMAT).is_ok());
    }

    #[tokio::test]
    async fn serve_answers_each_line_and_skips_garbage() {
        let (mut client, server_end) = duplex(8192);
        let (server_read, server_write) = tokio::io::split(server_end);

        let serve = tokio::spawn(async move { fixed().serve(server_read, server_write).await });

        client
            .write_all(b"{not json\n\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"tools/list\"}\n")
            .await
            .unwrap();

        let mut reader = FrameReader::new(&mut client);
        let parse_error = reader.receive().await.unwrap().unwrap();
        assert_eq!(parse_error["error"]["code"], codes::PARSE_ERROR);
        let listed = reader.receive().await.unwrap().unwrap();
        assert_eq!(listed["id"], 7);
        assert_eq!(listed["result"]["tools"][0]["name"], TOOL_NAME);
        drop(reader);

        client.shutdown().await.unwrap();
        drop(client);
        serve.await.unwrap().unwrap();
    }
}
