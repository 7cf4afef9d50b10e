//! Client sessions with MCP hosts (spawn, handshake, calls, teardown).

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsParams,
    ListToolsResult, RequestId, Tool, error_codes, is_supported_version,
};
use crate::state::SessionState;
use crate::transport::{FrameReader, FrameWriter};

/// Default timeout for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// How long `close` waits for a child to exit after its stdin is closed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How to launch a host process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

type BoxReader = Box<dyn AsyncBufRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Channel {
    reader: FrameReader<BoxReader>,
    writer: FrameWriter<BoxWriter>,
}

impl Channel {
    async fn send(&mut self, message: &impl Serialize) -> Result<()> {
        self.writer.send(message).await.map_err(|e| match e {
            Error::Transport(io) if io.kind() == ErrorKind::BrokenPipe => Error::ServerExited,
            other => other,
        })
    }

    /// Write `request` and wait for the response carrying its id.
    async fn exchange(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.send(request).await?;

        loop {
            match self.reader.next_message().await? {
                None => return Err(Error::ServerExited),
                Some(JsonRpcMessage::Response(response)) => {
                    if response.id.as_ref() == Some(&request.id) {
                        return Ok(response);
                    }
                    return Err(match (response.id, response.error) {
                        (None, Some(error)) => {
                            Error::InvalidResponse(format!("server rejected the request: {error}"))
                        }
                        (id, _) => Error::InvalidResponse(format!(
                            "response ID mismatch: expected {:?}, got {id:?}",
                            request.id
                        )),
                    });
                }
                Some(JsonRpcMessage::Notification(notification)) => {
                    debug!(method = %notification.method, "server notification");
                }
                Some(JsonRpcMessage::Request(server_request)) => {
                    debug!(method = %server_request.method, "refusing server request");
                    let reply = JsonRpcResponse::failure(
                        Some(server_request.id),
                        JsonRpcError::new(
                            error_codes::METHOD_NOT_FOUND,
                            format!("Method not found: {}", server_request.method),
                        ),
                    );
                    self.send(&reply).await?;
                }
            }
        }
    }
}

/// One client connection to a host.
///
/// Requests are serialized: the channel lock is held from write to read, so
/// at most one request is ever outstanding.
pub struct Session {
    name: String,
    process: Mutex<Option<Child>>,
    channel: Mutex<Channel>,
    state: Mutex<SessionState>,
    next_id: AtomicI64,
    timeout: Duration,
    server_info: Mutex<Option<InitializeResult>>,
    /// Held for a whole `initialize` so concurrent callers share one handshake.
    handshake: Mutex<()>,
}

impl Session {
    /// Spawn a host process and attach to its stdin/stdout.
    pub async fn spawn(config: ServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(Error::Spawn)?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        debug!(server = %config.name, command = %config.command, pid = ?process.id(), "spawned");

        let mut session = Self::connect(config.name, stdout, stdin);
        session.process = Mutex::new(Some(process));
        Ok(session)
    }

    /// Attach to an already-open channel.
    pub fn connect<R, W>(name: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: BoxReader = Box::new(BufReader::new(reader));
        let writer: BoxWriter = Box::new(writer);
        Self {
            name: name.into(),
            process: Mutex::new(None),
            channel: Mutex::new(Channel {
                reader: FrameReader::new(reader),
                writer: FrameWriter::new(writer),
            }),
            state: Mutex::new(SessionState::Uninitialized),
            next_id: AtomicI64::new(1),
            timeout: DEFAULT_TIMEOUT,
            server_info: Mutex::new(None),
            handshake: Mutex::new(()),
        }
    }

    /// Per-request timeout. Expiry fails the session.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Handshake result, once initialized.
    pub async fn server_info(&self) -> Option<InitializeResult> {
        self.server_info.lock().await.clone()
    }

    /// Perform the `initialize` handshake.
    ///
    /// Calling it again on a ready session returns the cached result without
    /// touching the channel.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let _handshake = self.handshake.lock().await;
        match self.state().await {
            SessionState::Ready => {
                if let Some(info) = self.server_info().await {
                    return Ok(info);
                }
            }
            SessionState::Closed => return Err(Error::Closed),
            SessionState::Uninitialized => {}
        }

        let params = InitializeParams::default();
        let result: InitializeResult = match self.request("initialize", Some(params)).await {
            Ok(result) => result,
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => return Err(self.reject(e.to_string()).await),
        };

        if !is_supported_version(&result.protocol_version) {
            let reason = format!(
                "server chose unsupported protocol version {}",
                result.protocol_version
            );
            return Err(self.reject(reason).await);
        }

        self.notify("notifications/initialized").await?;

        info!(
            server = %self.name,
            host = %result.server_info.name,
            version = %result.protocol_version,
            "session ready"
        );
        *self.server_info.lock().await = Some(result.clone());
        *self.state.lock().await = SessionState::Ready;
        Ok(result)
    }

    /// All tools the host serves, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.require_ready().await?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();
        loop {
            let params = ListToolsParams {
                cursor: cursor.clone(),
            };
            let page: ListToolsResult = self.request("tools/list", Some(params)).await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !seen.insert(next.clone()) => {
                    return Err(self
                        .fail(Error::InvalidResponse(format!("tools/list cursor {next} repeats")))
                        .await);
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(tools)
    }

    /// Call a tool. Tool-level failures come back as `is_error` results.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        self.require_ready().await?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        self.request("tools/call", Some(params)).await
    }

    /// Call a tool and return its text, mapping `is_error` to
    /// [`Error::ToolCallFailed`].
    pub async fn call_tool_text(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<String> {
        let result = self.call_tool(name, arguments).await?;
        if result.is_error {
            return Err(Error::ToolCallFailed(result.joined_text()));
        }
        Ok(result.joined_text())
    }

    pub async fn ping(&self) -> Result<()> {
        let _: Value = self.request("ping", None::<()>).await?;
        Ok(())
    }

    /// Whether the host process is still alive. For sessions without a child
    /// process this is whether the session is still open.
    pub async fn is_running(&self) -> bool {
        match self.process.lock().await.as_mut() {
            Some(process) => matches!(process.try_wait(), Ok(None)),
            None => !self.state().await.is_closed(),
        }
    }

    /// Close the session and release the host.
    ///
    /// Closes the host's stdin, waits up to [`SHUTDOWN_GRACE`] for it to
    /// exit, then kills it. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        *self.state.lock().await = SessionState::Closed;

        {
            let mut channel = self.channel.lock().await;
            // The peer may already be gone.
            let _ = channel.writer.shutdown().await;
        }

        let Some(mut process) = self.process.lock().await.take() else {
            return Ok(());
        };

        match timeout(SHUTDOWN_GRACE, process.wait()).await {
            Ok(Ok(status)) => debug!(server = %self.name, %status, "host exited"),
            Ok(Err(e)) => warn!(server = %self.name, error = %e, "failed to wait for host"),
            Err(_) => {
                warn!(server = %self.name, "host did not exit, killing");
                process.kill().await?;
            }
        }
        Ok(())
    }

    /// Close the session, consuming it.
    pub async fn shutdown(self) -> Result<()> {
        self.close().await
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn require_ready(&self) -> Result<()> {
        match self.state().await {
            SessionState::Ready => Ok(()),
            SessionState::Uninitialized => Err(Error::NotInitialized),
            SessionState::Closed => Err(Error::Closed),
        }
    }

    /// Mark the session closed and hand back `error`.
    async fn fail(&self, error: Error) -> Error {
        warn!(server = %self.name, %error, "session failed");
        *self.state.lock().await = SessionState::Closed;
        error
    }

    async fn reject(&self, reason: String) -> Error {
        self.fail(Error::HandshakeRejected(reason)).await
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let mut request = JsonRpcRequest::new(self.next_request_id(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        let outcome = {
            let mut channel = self.channel.lock().await;
            // Re-checked under the channel lock: a request that failed while
            // we waited may have closed the session.
            if self.state().await.is_closed() {
                return Err(Error::Closed);
            }
            debug!(server = %self.name, id = ?request.id, method, "request");
            match timeout(self.timeout, channel.exchange(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Timeout),
            }
        };

        let response = match outcome {
            Ok(response) => response,
            Err(e) if e.is_session_fatal() => return Err(self.fail(e).await),
            Err(e) => return Err(e),
        };

        let value = response.into_result()?;
        Ok(serde_json::from_value(value)?)
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let notification = JsonRpcNotification::new(method);
        let mut channel = self.channel.lock().await;
        match channel.send(&notification).await {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(channel);
                Err(self.fail(e).await)
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_builder() {
        let config = ServerConfig::new("math", "toolbox").args(["serve", "math"]);
        assert_eq!(config.name, "math");
        assert_eq!(config.args, ["serve", "math"]);
        assert!(config.env.is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let config = ServerConfig::new("missing", "/nonexistent/toolbox-host");
        let err = Session::spawn(config).await.unwrap_err();
        assert!(matches!(err, Error::Spawn(_)));
    }

    #[tokio::test]
    async fn tool_requests_need_a_handshake() {
        let (client, _host) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(client);
        let session = Session::connect("test", reader, writer);

        assert!(matches!(session.list_tools().await, Err(Error::NotInitialized)));
        assert!(matches!(
            session.call_tool("add", None).await,
            Err(Error::NotInitialized)
        ));
        assert_eq!(session.state().await, SessionState::Uninitialized);
    }
}
