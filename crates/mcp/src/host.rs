//! Serving a tool registry over a framed channel.

use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, Implementation, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId,
    SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, error_codes, is_supported_version,
};
use crate::registry::ToolRegistry;
use crate::state::SessionState;
use crate::transport::{FrameReader, FrameWriter};

/// A tool host: a named registry plus the request loop that serves it.
#[derive(Debug)]
pub struct Host {
    info: Implementation,
    instructions: Option<String>,
    registry: ToolRegistry,
}

/// What the loop does after answering a request.
enum Next {
    Continue,
    Close(Error),
}

impl Host {
    pub fn new(name: impl Into<String>, version: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            info: Implementation::new(name, version),
            instructions: None,
            registry,
        }
    }

    /// Free-form usage hint returned from `initialize`.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn info(&self) -> &Implementation {
        &self.info
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Serve one session on this process's stdin/stdout.
    pub async fn serve_stdio(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await
    }

    /// Serve one session until the peer closes the channel.
    ///
    /// Requests are handled one at a time in arrival order. Returns an error
    /// when the session had to be failed: a malformed frame, a rejected
    /// handshake or a broken channel.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = FrameReader::new(reader);
        let mut writer = FrameWriter::new(writer);
        let mut state = SessionState::Uninitialized;

        info!(host = %self.info.name, tools = self.registry.len(), "serving");

        let outcome = loop {
            let message = match reader.next_message().await {
                Ok(Some(message)) => message,
                Ok(None) => break Ok(()),
                Err(e @ (Error::Malformed(_) | Error::FrameTooLarge { .. })) => {
                    warn!(error = %e, "malformed frame, closing session");
                    let reply = JsonRpcResponse::failure(
                        None,
                        JsonRpcError::new(error_codes::PARSE_ERROR, format!("Parse error: {e}")),
                    );
                    // The session is failing either way.
                    let _ = writer.send(&reply).await;
                    break Err(e);
                }
                Err(e) => break Err(e),
            };

            match message {
                JsonRpcMessage::Request(request) => {
                    let (reply, next) = self.handle_request(&mut state, request).await;
                    if let Err(e) = writer.send(&reply).await {
                        break Err(e);
                    }
                    if let Next::Close(e) = next {
                        break Err(e);
                    }
                }
                JsonRpcMessage::Notification(notification) => {
                    self.handle_notification(state, &notification);
                }
                JsonRpcMessage::Response(response) => {
                    debug!(id = ?response.id, "ignoring unsolicited response");
                }
            }
        };

        state = SessionState::Closed;
        info!(host = %self.info.name, %state, "session ended");
        outcome
    }

    async fn handle_request(
        &self,
        state: &mut SessionState,
        request: JsonRpcRequest,
    ) -> (JsonRpcResponse, Next) {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;
        debug!(?id, %method, "request");

        match method.as_str() {
            "initialize" => self.initialize(state, id, params),
            "ping" => (JsonRpcResponse::success(id, json!({})), Next::Continue),
            "tools/list" | "tools/call" if !state.is_ready() => (
                JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::new(error_codes::NOT_INITIALIZED, "session not initialized"),
                ),
                Next::Continue,
            ),
            "tools/list" => {
                let result = ListToolsResult {
                    tools: self.registry.list(),
                    next_cursor: None,
                };
                (respond(id, &result), Next::Continue)
            }
            "tools/call" => {
                let params: CallToolParams = match parse_params(params) {
                    Ok(params) => params,
                    Err(error) => return (JsonRpcResponse::failure(Some(id), error), Next::Continue),
                };
                let result = self.registry.dispatch(&params.name, params.arguments).await;
                debug!(tool = %params.name, is_error = result.is_error, "tool call finished");
                (respond(id, &result), Next::Continue)
            }
            _ => (
                JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::new(
                        error_codes::METHOD_NOT_FOUND,
                        format!("Method not found: {method}"),
                    ),
                ),
                Next::Continue,
            ),
        }
    }

    fn initialize(
        &self,
        state: &mut SessionState,
        id: RequestId,
        params: Option<Value>,
    ) -> (JsonRpcResponse, Next) {
        if state.is_ready() {
            let error = JsonRpcError::new(error_codes::INVALID_REQUEST, "session already initialized");
            return (JsonRpcResponse::failure(Some(id), error), Next::Continue);
        }

        let params: InitializeParams = match parse_params(params) {
            Ok(params) => params,
            Err(error) => {
                let reason = error.message.clone();
                return (
                    JsonRpcResponse::failure(Some(id), error),
                    Next::Close(Error::HandshakeRejected(reason)),
                );
            }
        };

        let requested = params.protocol_version;
        if !is_supported_version(&requested) {
            warn!(%requested, "unsupported protocol version");
            let error = JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("Unsupported protocol version: {requested}"),
            )
            .with_data(json!({
                "supported": SUPPORTED_PROTOCOL_VERSIONS,
                "requested": requested,
            }));
            return (
                JsonRpcResponse::failure(Some(id), error),
                Next::Close(Error::HandshakeRejected(format!(
                    "unsupported protocol version {requested}"
                ))),
            );
        }

        info!(
            client = %params.client_info.name,
            version = %requested,
            "session initialized"
        );
        *state = SessionState::Ready;

        let result = InitializeResult {
            protocol_version: requested,
            capabilities: ServerCapabilities::tools_only(),
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        };
        (respond(id, &result), Next::Continue)
    }

    fn handle_notification(&self, state: SessionState, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" => debug!(%state, "client confirmed initialization"),
            // In-flight calls always run to completion.
            "notifications/cancelled" => debug!("ignoring cancellation"),
            other => debug!(method = other, "ignoring notification"),
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
) -> std::result::Result<T, JsonRpcError> {
    let params = params.unwrap_or(Value::Null);
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::new(error_codes::INVALID_PARAMS, format!("Invalid params: {e}")))
}

fn respond(id: RequestId, result: &impl Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::failure(
            Some(id),
            JsonRpcError::new(error_codes::INTERNAL_ERROR, format!("Internal error: {e}")),
        ),
    }
}
