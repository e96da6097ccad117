mod common;

use std::sync::Arc;

use common::connect;
use mcp::{Error, ToolRegistry};
use serde_json::json;

fn clock_tools() -> serde_json::Value {
    json!({
        "tools": [{
            "name": "get_current_time",
            "description": "Get the current date and time",
            "inputSchema": {"type": "object", "properties": {}}
        }]
    })
}

#[tokio::test]
async fn discover_then_invoke_known_tool() {
    let (session, mut provider) = connect();
    let session = Arc::new(session);

    let server = tokio::spawn(async move {
        let list = provider.next_request().await;
        assert_eq!(list["method"], "tools/list");
        provider.reply(&list, clock_tools()).await;

        let call = provider.next_request().await;
        assert_eq!(call["method"], "tools/call");
        assert_eq!(call["params"]["name"], "get_current_time");
        assert_eq!(call["params"]["arguments"], json!({}));
        provider.reply(&call, json!("2024-03-26 15:30:45")).await;
        provider
    });

    let registry = ToolRegistry::discover(session).await.unwrap();
    assert_eq!(registry.tools().len(), 1);
    assert!(registry.get("get_current_time").is_some());

    let result = registry
        .invoke("get_current_time", serde_json::Value::Null)
        .await
        .unwrap();
    assert_eq!(result, json!("2024-03-26 15:30:45"));
    let _provider = server.await.unwrap();
}

#[tokio::test]
async fn empty_registry_rejects_every_tool_without_rpc() {
    let (session, mut provider) = connect();
    let session = Arc::new(session);

    let server = tokio::spawn(async move {
        let list = provider.next_request().await;
        provider.reply(&list, json!({"tools": []})).await;
        provider
    });

    let registry = ToolRegistry::discover(session).await.unwrap();
    let mut provider = server.await.unwrap();
    assert!(registry.is_empty());

    let err = registry
        .invoke("get_current_time", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTool(name) if name == "get_current_time"));
    assert!(provider.is_silent().await, "provider must not be contacted");
}

#[tokio::test]
async fn unknown_tool_is_rejected_locally() {
    let (session, mut provider) = connect();
    let session = Arc::new(session);

    let server = tokio::spawn(async move {
        let list = provider.next_request().await;
        provider.reply(&list, clock_tools()).await;
        provider
    });

    let registry = ToolRegistry::discover(session).await.unwrap();
    let mut provider = server.await.unwrap();

    let err = registry
        .invoke("get_weather", json!({"city": "Oslo"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTool(_)));
    assert!(provider.is_silent().await);
}

#[tokio::test]
async fn malformed_tool_list_is_a_registry_error() {
    let (session, mut provider) = connect();
    let session = Arc::new(session);

    let server = tokio::spawn(async move {
        let list = provider.next_request().await;
        provider
            .reply(&list, json!({"tools": [{"description": "no name"}]}))
            .await;
        provider
    });

    let err = ToolRegistry::discover(session).await.err().unwrap();
    assert!(matches!(err, Error::Registry(_)), "got {err:?}");
    let _provider = server.await.unwrap();
}

#[tokio::test]
async fn provider_errors_surface_from_invoke() {
    let (session, mut provider) = connect();
    let session = Arc::new(session);

    let server = tokio::spawn(async move {
        let list = provider.next_request().await;
        provider.reply(&list, clock_tools()).await;

        let call = provider.next_request().await;
        provider.reply_error(&call, -32603, "Internal error: clock unavailable").await;
        provider
    });

    let registry = ToolRegistry::discover(session).await.unwrap();
    let err = registry
        .invoke("get_current_time", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote(e) if e.message.contains("clock unavailable")));
    let _provider = server.await.unwrap();
}
