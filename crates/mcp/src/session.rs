//! RPC session: request/response correlation with a tool provider.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    Incoming, InitializeParams, InitializeResult, JsonRpcRequest, RequestId, methods,
};
use crate::transport::{FrameReader, FrameWriter, framed};

/// Default timeout for a single call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// How long a provider gets to exit after its stdin is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

const NOTIFICATION_BUFFER: usize = 64;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type PendingResponse = oneshot::Sender<Result<Value>>;

/// How to launch a tool provider process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Build a config from a shell-like command line such as
    /// `python mcp_server.py`.
    pub fn from_command_line(name: impl Into<String>, line: &str) -> Result<Self> {
        let mut parts = shlex::split(line)
            .ok_or_else(|| Error::InvalidCommand(format!("cannot parse '{line}'")))?;
        if parts.is_empty() {
            return Err(Error::InvalidCommand("command is empty".to_string()));
        }
        let command = parts.remove(0);
        Ok(Self {
            name: name.into(),
            command,
            args: parts,
            env: HashMap::new(),
        })
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Per-session tuning.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A notification pushed by the provider.
#[derive(Debug, Clone)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

/// Why the pending table stopped accepting entries.
#[derive(Debug, Clone)]
enum Closure {
    Shutdown,
    Broken(String),
}

impl Closure {
    fn error(&self) -> Error {
        match self {
            Closure::Shutdown => Error::Cancelled,
            Closure::Broken(reason) => Error::Transport(reason.clone()),
        }
    }
}

#[derive(Default)]
struct PendingTable {
    entries: HashMap<RequestId, PendingResponse>,
    closure: Option<Closure>,
}

/// State shared between callers and the receipt task.
struct Shared {
    name: String,
    pending: Mutex<PendingTable>,
    closed: AtomicBool,
    protocol_errors: AtomicU64,
}

impl Shared {
    async fn register(&self, id: RequestId, tx: PendingResponse) -> Result<()> {
        let mut table = self.pending.lock().await;
        if let Some(closure) = &table.closure {
            return Err(closure.error());
        }
        table.entries.insert(id, tx);
        Ok(())
    }

    async fn forget(&self, id: &RequestId) {
        self.pending.lock().await.entries.remove(id);
    }

    /// Stop accepting requests and fail everything still waiting.
    async fn close(&self, closure: Closure) {
        let drained: Vec<PendingResponse> = {
            let mut table = self.pending.lock().await;
            if table.closure.is_none() {
                table.closure = Some(closure.clone());
            }
            self.closed.store(true, Ordering::SeqCst);
            table.entries.drain().map(|(_, tx)| tx).collect()
        };

        if !drained.is_empty() {
            debug!(provider = %self.name, count = drained.len(), "failing pending requests");
        }
        for tx in drained {
            let _ = tx.send(Err(closure.error()));
        }
    }

    async fn dispatch(&self, value: Value, notifications: &mpsc::Sender<Notification>) {
        match Incoming::from_value(value) {
            Ok(Incoming::Response(response)) => {
                let id = response.id.clone();
                let entry = self.pending.lock().await.entries.remove(&id);
                match entry {
                    Some(tx) => {
                        debug!(provider = %self.name, %id, "response received");
                        let _ = tx.send(response.into_result().map_err(Error::Remote));
                    }
                    None => self.protocol_error(format!("no pending request with id {id}")),
                }
            }
            Ok(Incoming::Notification { method, params }) => {
                debug!(provider = %self.name, %method, "notification received");
                if method == methods::TOOLS_LIST_CHANGED {
                    warn!(provider = %self.name, "tool list changed; registry keeps the startup list");
                }
                if notifications
                    .try_send(Notification { method, params })
                    .is_err()
                {
                    debug!(provider = %self.name, "notification dropped");
                }
            }
            Ok(Incoming::Request { id, method, .. }) => {
                self.protocol_error(format!("unsupported provider request '{method}' (id {id})"))
            }
            Err(detail) => self.protocol_error(detail),
        }
    }

    fn protocol_error(&self, detail: String) {
        self.protocol_errors.fetch_add(1, Ordering::SeqCst);
        let error = Error::Protocol(detail);
        warn!(provider = %self.name, %error, "ignoring message");
    }
}

/// A JSON-RPC session with one tool provider.
///
/// Owns the framed stream and, when created with [`RpcSession::spawn`], the
/// provider process. Any number of [`call`](Self::call)s may be in flight;
/// a background task routes each response to its caller by id.
pub struct RpcSession {
    shared: Arc<Shared>,
    writer: Mutex<Option<FrameWriter<BoxedWriter>>>,
    next_id: AtomicI64,
    timeout: Duration,
    shut_down: AtomicBool,
    receiver: JoinHandle<()>,
    child: Mutex<Option<Child>>,
    notifications: std::sync::Mutex<Option<mpsc::Receiver<Notification>>>,
}

impl RpcSession {
    /// Start a session over an existing duplex stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect<R, W>(name: impl Into<String>, reader: R, writer: W, config: SessionConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let shared = Arc::new(Shared {
            name: name.into(),
            pending: Mutex::new(PendingTable::default()),
            closed: AtomicBool::new(false),
            protocol_errors: AtomicU64::new(0),
        });

        let (reader, writer) = framed(reader, Box::new(writer) as BoxedWriter);
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_BUFFER);
        let receiver = tokio::spawn(receive_loop(shared.clone(), reader, notify_tx));

        Self {
            shared,
            writer: Mutex::new(Some(writer)),
            next_id: AtomicI64::new(1),
            timeout: config.timeout,
            shut_down: AtomicBool::new(false),
            receiver,
            child: Mutex::new(None),
            notifications: std::sync::Mutex::new(Some(notify_rx)),
        }
    }

    /// Launch a provider process and connect to its stdin/stdout.
    pub async fn spawn(provider: &ProviderConfig, config: SessionConfig) -> Result<Self> {
        let mut cmd = Command::new(&provider.command);
        cmd.args(&provider.args)
            .envs(&provider.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_loop(provider.name.clone(), stderr);
        }

        debug!(provider = %provider.name, command = %provider.command, pid = ?child.id(), "provider spawned");

        let session = Self::connect(provider.name.clone(), stdout, stdin, config);
        *session.child.lock().await = Some(child);
        Ok(session)
    }

    /// Get the provider name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether the session was shut down or its transport failed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Number of unmatched or malformed messages seen so far.
    pub fn protocol_errors(&self) -> u64 {
        self.shared.protocol_errors.load(Ordering::SeqCst)
    }

    /// Take the stream of provider notifications. Available once.
    pub fn take_notifications(&self) -> Option<mpsc::Receiver<Notification>> {
        self.notifications
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
    }

    /// Perform the initialize handshake.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let result: InitializeResult = self
            .request(methods::INITIALIZE, InitializeParams::default())
            .await?;
        self.notify(methods::INITIALIZED, Value::Object(Map::new()))
            .await?;

        debug!(
            provider = %self.name(),
            protocol_version = ?result.protocol_version,
            server = ?result.server_info.as_ref().map(|info| &info.name),
            "provider initialized"
        );
        Ok(result)
    }

    /// Send a request and wait for the matching response.
    ///
    /// The session timeout covers the whole exchange, including a write that
    /// stalls because the provider stopped reading.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let deadline = Instant::now() + self.timeout;
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.shared.register(id.clone(), tx).await?;

        debug!(provider = %self.name(), %id, method, "sending request");
        let request = JsonRpcRequest::new(id.clone(), method, params);
        if let Err(e) = self.send_before(deadline, method, &request).await {
            self.shared.forget(&id).await;
            return Err(e);
        }

        match timeout_at(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Cancelled),
            Err(_) => {
                self.shared.forget(&id).await;
                Err(Error::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }

    /// Typed wrapper around [`call`](Self::call).
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let value = self.call(method, params).await?;
        serde_json::from_value(value).map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        self.send_before(deadline, method, &JsonRpcRequest::notification(method, params))
            .await
    }

    /// Tear the session down.
    ///
    /// Stops the receipt task, fails every pending call with
    /// [`Error::Cancelled`], closes the stream and reaps the provider. A
    /// writer stuck on a full pipe is abandoned after a short grace period.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(provider = %self.name(), "shutting down session");

        self.receiver.abort();
        self.shared.close(Closure::Shutdown).await;

        match timeout(SHUTDOWN_GRACE, self.writer.lock()).await {
            Ok(mut guard) => {
                if let Some(mut writer) = guard.take() {
                    let _ = timeout(SHUTDOWN_GRACE, writer.close()).await;
                }
            }
            Err(_) => warn!(provider = %self.name(), "writer is blocked, abandoning it"),
        }

        if let Some(mut child) = self.child.lock().await.take() {
            if timeout(SHUTDOWN_GRACE, child.wait()).await.is_err() {
                let _ = child.kill().await;
            }
        }

        Ok(())
    }

    /// Write `message`, giving up at `deadline`.
    ///
    /// A write that misses the deadline may have left half a frame on the
    /// wire, so the session is marked broken.
    async fn send_before(
        &self,
        deadline: Instant,
        method: &str,
        message: &JsonRpcRequest,
    ) -> Result<()> {
        match timeout_at(deadline, self.send(message)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(provider = %self.name(), method, "provider stopped reading its input");
                self.shared
                    .close(Closure::Broken(format!("write of '{method}' stalled")))
                    .await;
                Err(Error::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }

    async fn send(&self, message: &JsonRpcRequest) -> Result<()> {
        let result = {
            let mut guard = self.writer.lock().await;
            match guard.as_mut() {
                Some(writer) => writer.send(message).await,
                None => Err(Error::Cancelled),
            }
        };

        if let Err(Error::Transport(reason)) = &result {
            self.shared.close(Closure::Broken(reason.clone())).await;
        }
        result
    }
}

impl Drop for RpcSession {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

async fn receive_loop<R>(
    shared: Arc<Shared>,
    mut reader: FrameReader<R>,
    notifications: mpsc::Sender<Notification>,
) where
    R: AsyncRead + Unpin,
{
    let reason = loop {
        match reader.receive().await {
            Ok(Some(value)) => shared.dispatch(value, &notifications).await,
            Ok(None) => break "provider closed its output stream".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    warn!(provider = %shared.name, %reason, "transport closed");
    shared.close(Closure::Broken(reason)).await;
}

fn spawn_stderr_loop(name: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(provider = %name, "stderr: {line}");
        }
    });
}
