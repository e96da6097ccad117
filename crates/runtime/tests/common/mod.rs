#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use mcp::{FrameReader, FrameWriter, RpcSession, SessionConfig};
use runtime::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Reply, ToolCall, ToolError,
    ToolHost, ToolSpec, Usage,
};
use serde_json::{Value, json};
use tokio::io::{DuplexStream, duplex};

pub fn call(id: &str, name: &str) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        input: json!({}),
    }
}

pub fn final_reply(text: &str) -> Result<ModelResponse, ModelError> {
    Ok(ModelResponse {
        reply: Reply::Final { text: text.into() },
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    })
}

pub fn tool_use(text: &str, calls: Vec<ToolCall>) -> Result<ModelResponse, ModelError> {
    Ok(ModelResponse {
        reply: Reply::ToolUse {
            text: text.into(),
            calls,
        },
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    })
}

/// Model backend that plays back a queue of responses and records requests.
#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
    advertised: Mutex<Vec<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<ModelResponse, ModelError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Tool names advertised on each request.
    pub fn advertised(&self) -> Vec<Vec<String>> {
        self.advertised.lock().unwrap().clone()
    }
}

impl Backend for ScriptedBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(request.messages.to_vec());
        self.advertised
            .lock()
            .unwrap()
            .push(request.tools.iter().map(|t| t.name.clone()).collect());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("script exhausted".into())))
    }
}

/// How a mock tool answers.
#[derive(Clone)]
pub enum Behavior {
    Return(Value),
    ReturnAfter(Duration, Value),
    Fail(ToolError),
}

/// Tool host with canned behavior per tool name.
pub struct MockTools {
    specs: Vec<ToolSpec>,
    behaviors: HashMap<String, Behavior>,
    executed: Mutex<Vec<String>>,
}

impl MockTools {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            behaviors: HashMap::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tool(mut self, name: &str, behavior: Behavior) -> Self {
        self.specs.push(ToolSpec {
            name: name.into(),
            description: format!("mock {name}"),
            schema: json!({"type": "object", "properties": {}}),
        });
        self.behaviors.insert(name.into(), behavior);
        self
    }

    /// Call ids in the order execution started.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl ToolHost for MockTools {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        self.executed.lock().unwrap().push(call.id.clone());
        match self.behaviors.get(&call.name).cloned() {
            Some(Behavior::Return(value)) => Ok(value),
            Some(Behavior::ReturnAfter(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Behavior::Fail(error)) => Err(error),
            None => Err(ToolError::NotFound(call.name.clone())),
        }
    }
}

/// The provider end of an in-memory RPC session.
pub struct FakeProvider {
    pub reader: FrameReader<DuplexStream>,
    pub writer: FrameWriter<DuplexStream>,
}

impl FakeProvider {
    pub async fn next_request(&mut self) -> Value {
        self.reader
            .receive()
            .await
            .expect("framing")
            .expect("client closed the stream")
    }

    pub async fn reply(&mut self, request: &Value, result: Value) {
        self.writer
            .send(&json!({"jsonrpc": "2.0", "id": request["id"], "result": result}))
            .await
            .unwrap();
    }

    /// Answer the handshake and tool listing with a single clock tool.
    pub async fn serve_startup(&mut self) {
        let init = self.next_request().await;
        assert_eq!(init["method"], "initialize");
        self.reply(&init, json!({"protocolVersion": "2025-03-26", "capabilities": {}}))
            .await;

        let initialized = self.next_request().await;
        assert_eq!(initialized["method"], "notifications/initialized");

        let list = self.next_request().await;
        assert_eq!(list["method"], "tools/list");
        self.reply(
            &list,
            json!({"tools": [{
                "name": "get_current_time",
                "description": "Get the current date and time",
                "inputSchema": {"type": "object", "properties": {}}
            }]}),
        )
        .await;
    }

    /// True if nothing arrives within a short window.
    pub async fn is_silent(&mut self) -> bool {
        tokio::time::timeout(Duration::from_millis(50), self.reader.receive())
            .await
            .is_err()
    }
}

pub fn connect() -> (RpcSession, FakeProvider) {
    let (client_out, provider_in) = duplex(64 * 1024);
    let (provider_out, client_in) = duplex(64 * 1024);
    let session = RpcSession::connect("fake", client_in, client_out, SessionConfig::default());
    let provider = FakeProvider {
        reader: FrameReader::new(provider_in),
        writer: FrameWriter::new(provider_out),
    };
    (session, provider)
}
