//! MCP (Model Context Protocol) over newline-delimited JSON-RPC stdio.
//!
//! Both sides of the protocol live here: [`Host`] serves a [`ToolRegistry`]
//! and [`Session`] is the client that spawns a host and calls its tools.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ServerConfig, Session};
//! use serde_json::json;
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig::new("math", "toolbox").args(["serve", "math"]);
//!
//! let session = Session::spawn(config).await?;
//! session.initialize().await?;
//!
//! for tool in session.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let args = json!({"a": 7, "b": 6}).as_object().cloned();
//! let product = session.call_tool_text("multiply", args).await?;
//! assert_eq!(product, "42");
//!
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod host;
mod protocol;
mod registry;
mod schema;
mod state;
mod transport;

pub use client::{DEFAULT_TIMEOUT, SHUTDOWN_GRACE, ServerConfig, Session};
pub use error::{Error, Result, ToolError};
pub use host::Host;
pub use protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    JSONRPC_VERSION, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, ListToolsParams, ListToolsResult, PROTOCOL_VERSION, RequestId,
    SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, Tool, ToolContent, ToolsCapability,
    error_codes, is_supported_version,
};
pub use registry::{ToolDescriptor, ToolFuture, ToolRegistry};
pub use schema::{Arguments, InputSchema, Param, ParamKind};
pub use state::SessionState;
pub use transport::{FrameReader, FrameWriter, MAX_FRAME_SIZE};
