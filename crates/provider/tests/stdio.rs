//! Drives the real `clock-provider` binary over its stdio.

use std::sync::Arc;

use mcp::{Error, ProviderConfig, RpcSession, SessionConfig, ToolRegistry};
use provider::{TIME_FORMAT, TOOL_NAME};
use runtime::{McpToolHost, ToolCall, ToolError, ToolHost};
use serde_json::json;

fn clock_provider() -> ProviderConfig {
    ProviderConfig::new("clock", env!("CARGO_BIN_EXE_clock-provider"))
}

#[tokio::test]
async fn handshake_and_discovery_over_stdio() {
    let session = Arc::new(
        RpcSession::spawn(&clock_provider(), SessionConfig::default())
            .await
            .unwrap(),
    );

    let init = session.initialize().await.unwrap();
    assert_eq!(init.protocol_version.as_deref(), Some("2025-03-26"));
    assert_eq!(init.server_info.unwrap().name, "clock-provider");

    let registry = ToolRegistry::discover(session.clone()).await.unwrap();
    assert_eq!(registry.tools().len(), 1);
    assert_eq!(registry.tools()[0].name, TOOL_NAME);

    let err = session.call("resources/list", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::Remote(e) if e.code == -32601));

    session.shutdown().await.unwrap();
    session.shutdown().await.unwrap();
    assert!(session.is_closed());
}

#[tokio::test]
async fn tool_host_returns_formatted_local_time() {
    let host = McpToolHost::spawn(&clock_provider(), SessionConfig::default())
        .await
        .unwrap();
    assert_eq!(host.specs()[0].name, TOOL_NAME);

    let call = ToolCall {
        id: "toolu_1".into(),
        name: TOOL_NAME.into(),
        input: json!({}),
    };
    let output = host.execute(&call).await.unwrap();
    let text = output.as_str().expect("flattened to text");
    assert!(chrono::NaiveDateTime::parse_from_str(text, TIME_FORMAT).is_ok());

    let weather = ToolCall {
        id: "toolu_2".into(),
        name: "get_weather".into(),
        input: json!({"city": "Paris"}),
    };
    assert_eq!(
        host.execute(&weather).await.unwrap_err(),
        ToolError::NotFound("get_weather".into())
    );

    host.shutdown().await;
    assert!(!host.is_available());
    assert_eq!(host.execute(&call).await.unwrap_err(), ToolError::Cancelled);
}

#[tokio::test]
async fn missing_binary_fails_to_spawn() {
    let config = ProviderConfig::new("ghost", "/nonexistent/clock-provider");
    let err = RpcSession::spawn(&config, SessionConfig::default())
        .await
        .err()
        .expect("spawn should fail");
    assert!(matches!(err, Error::Spawn(_)));
}
