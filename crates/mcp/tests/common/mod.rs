#![allow(dead_code)]

use mcp::{FrameReader, FrameWriter, RpcSession, SessionConfig};
use serde_json::{Value, json};
use tokio::io::{DuplexStream, duplex};

/// The provider end of an in-memory session.
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

    pub async fn reply_error(&mut self, request: &Value, code: i32, message: &str) {
        self.writer
            .send(&json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": code, "message": message}
            }))
            .await
            .unwrap();
    }

    /// True if nothing arrives within a short window.
    pub async fn is_silent(&mut self) -> bool {
        tokio::time::timeout(std::time::Duration::from_millis(50), self.reader.receive())
            .await
            .is_err()
    }
}

pub fn connect() -> (RpcSession, FakeProvider) {
    connect_with(SessionConfig::default())
}

pub fn connect_with(config: SessionConfig) -> (RpcSession, FakeProvider) {
    let (client_out, provider_in) = duplex(64 * 1024);
    let (provider_out, client_in) = duplex(64 * 1024);
    let session = RpcSession::connect("fake", client_in, client_out, config);
    let provider = FakeProvider {
        reader: FrameReader::new(provider_in),
        writer: FrameWriter::new(provider_out),
    };
    (session, provider)
}

/// A provider that never reads its input, so the client's writes back up
/// once the small pipe is full.
pub struct DeafProvider {
    _input: DuplexStream,
    _output: DuplexStream,
}

pub fn connect_deaf(config: SessionConfig) -> (RpcSession, DeafProvider) {
    let (client_out, provider_in) = duplex(256);
    let (provider_out, client_in) = duplex(256);
    let session = RpcSession::connect("deaf", client_in, client_out, config);
    let provider = DeafProvider {
        _input: provider_in,
        _output: provider_out,
    };
    (session, provider)
}
