//! The concrete MCP tool hosts.
//!
//! Each host is a [`ToolRegistry`] built at startup from [`Settings`] and
//! served through [`mcp::Host`]. Hosts that need credentials refuse to build
//! without them.

pub mod arxiv;
mod error;
mod http;
pub mod math;
pub mod settings;
mod text;
pub mod weather;
pub mod web_search;
pub mod wikipedia;

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use mcp::{Arguments, Host, ToolError, ToolRegistry};

pub use error::{Error, Result};
pub use settings::Settings;

/// The hosts this crate can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    Math,
    Weather,
    Wikipedia,
    Arxiv,
    WebSearch,
}

impl HostKind {
    pub const ALL: [HostKind; 5] = [
        HostKind::Math,
        HostKind::Weather,
        HostKind::Wikipedia,
        HostKind::Arxiv,
        HostKind::WebSearch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HostKind::Math => "math",
            HostKind::Weather => "weather",
            HostKind::Wikipedia => "wikipedia",
            HostKind::Arxiv => "arxiv",
            HostKind::WebSearch => "web-search",
        }
    }

    fn instructions(self) -> &'static str {
        match self {
            HostKind::Math => "Basic arithmetic on JSON numbers. Results are returned as text.",
            HostKind::Weather => "Current conditions and 5-day forecasts from OpenWeatherMap, in metric units.",
            HostKind::Wikipedia => "Search English Wikipedia and read article summaries or sections.",
            HostKind::Arxiv => "Search arXiv papers by keyword, author or category.",
            HostKind::WebSearch => "Web and news search through Tavily.",
        }
    }

    /// Tool registry for this host.
    pub fn registry(self, settings: &Settings) -> Result<ToolRegistry> {
        let registry = match self {
            HostKind::Math => math::registry()?,
            HostKind::Weather => weather::registry(settings)?,
            HostKind::Wikipedia => wikipedia::registry(settings)?,
            HostKind::Arxiv => arxiv::registry(settings)?,
            HostKind::WebSearch => web_search::registry(settings)?,
        };
        Ok(registry)
    }

    /// Build the host, failing if a required credential is missing.
    pub fn build(self, settings: &Settings) -> Result<Host> {
        let host = Host::new(self.name(), env!("CARGO_PKG_VERSION"), self.registry(settings)?)
            .with_instructions(self.instructions());
        tracing::debug!(host = self.name(), tools = host.registry().len(), "host built");
        Ok(host)
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HostKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "math" => Ok(HostKind::Math),
            "weather" => Ok(HostKind::Weather),
            "wikipedia" => Ok(HostKind::Wikipedia),
            "arxiv" => Ok(HostKind::Arxiv),
            "web-search" | "web_search" | "tavily" => Ok(HostKind::WebSearch),
            _ => Err(Error::UnknownHost(s.to_string())),
        }
    }
}

/// Adapt a `self: Arc<Self>` async method into a registry handler.
pub(crate) fn bind<T, F, Fut>(
    target: &Arc<T>,
    method: F,
) -> impl Fn(Arguments) -> Fut + Send + Sync + 'static
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<String, ToolError>> + Send + 'static,
{
    let target = Arc::clone(target);
    move |args| method(Arc::clone(&target), args)
}

/// A positive result count argument.
pub(crate) fn limit(args: &Arguments, name: &str) -> std::result::Result<u32, ToolError> {
    let n = args.i64(name)?;
    u32::try_from(n)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ToolError::invalid(name, "must be a positive integer"))
}
