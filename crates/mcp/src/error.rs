//! MCP error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Session-side errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn server: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("server exited unexpectedly")]
    ServerExited,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("session not initialized")]
    NotInitialized,

    #[error("session closed")]
    Closed,

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),
}

impl Error {
    /// Whether this error ends the session it occurred on.
    ///
    /// Everything else is confined to a single request.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::Spawn(_)
                | Error::Transport(_)
                | Error::ServerExited
                | Error::Timeout
                | Error::Malformed(_)
                | Error::FrameTooLarge { .. }
                | Error::InvalidResponse(_)
                | Error::HandshakeRejected(_)
                | Error::Closed
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Host-side errors for a single tool.
///
/// Registration fails with `Duplicate`; the other variants are produced while
/// dispatching and end up as `is_error` results, never as transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("tool already registered: {0}")]
    Duplicate(String),

    #[error("unknown tool: {0}")]
    Unknown(String),

    #[error("invalid arguments: {field}: {reason}")]
    InvalidArguments { field: String, reason: String },

    #[error("{0}")]
    Upstream(String),
}

impl ToolError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}
