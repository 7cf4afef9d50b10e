//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// `toolbox.toml` could not be used.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// `--args` was not a JSON object.
    #[error("invalid --args: {0}")]
    InvalidArguments(String),

    /// A session with a host failed, or a tool call returned an error.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    /// A host could not be built.
    #[error(transparent)]
    Host(#[from] hosts::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
