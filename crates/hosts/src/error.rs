use mcp::ToolError;
use thiserror::Error;

/// Errors building a host. Tool-call failures are [`ToolError`]s instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} environment variable is required")]
    MissingCredential(&'static str),

    #[error("unknown host '{0}' (expected math, weather, wikipedia, arxiv or web-search)")]
    UnknownHost(String),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Registry(#[from] ToolError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
