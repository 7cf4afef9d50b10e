//! Configuration loading from toolbox.toml.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hosts::HostKind;
use mcp::ServerConfig;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "toolbox.toml";

/// Default per-request timeout. Sits above the hosts' own HTTP and call
/// timeouts so upstream failures arrive as error results, not timeouts.
const DEFAULT_TIMEOUT_SECS: u64 = 45;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,

    /// Launch overrides, keyed by server name.
    #[serde(default)]
    pub servers: BTreeMap<String, ServerEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// How to launch one server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.client.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(config)
    }

    /// Load `explicit` if given, else `toolbox.toml` in the current
    /// directory if present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            Self::load(local)
        } else {
            Ok(Self::default())
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.client.timeout_secs)
    }

    /// Launch parameters for `name`.
    ///
    /// A `[servers.<name>]` entry wins; otherwise built-in host names run
    /// this executable as `serve <name>`.
    pub fn server(&self, name: &str) -> Result<ServerConfig, ConfigError> {
        if let Some(entry) = self.servers.get(name) {
            return Ok(ServerConfig {
                name: name.to_string(),
                command: entry.command.clone(),
                args: entry.args.clone(),
                env: entry.env.clone(),
            });
        }

        let kind: HostKind = name
            .parse()
            .map_err(|_| ConfigError::UnknownServer(name.to_string()))?;
        let exe = std::env::current_exe().map_err(ConfigError::CurrentExe)?;
        Ok(ServerConfig::new(kind.name(), exe.to_string_lossy()).args(["serve", kind.name()]))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("client.timeout_secs must be greater than zero")]
    InvalidTimeout,

    #[error(
        "unknown server '{0}': add a [servers.{0}] entry or use math, weather, wikipedia, arxiv or web-search"
    )]
    UnknownServer(String),

    #[error("cannot locate the toolbox executable: {0}")]
    CurrentExe(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.servers.is_empty());
    }

    #[test]
    fn parses_client_and_servers() {
        let config = Config::parse(
            r#"
            [client]
            timeout_secs = 5

            [servers.math]
            command = "/usr/local/bin/toolbox"
            args = ["serve", "math"]

            [servers.remote]
            command = "ssh"
            args = ["box", "toolbox", "serve", "weather"]
            env = { OPENWEATHERMAP_API_KEY = "k" }
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout(), Duration::from_secs(5));
        let remote = config.server("remote").unwrap();
        assert_eq!(remote.command, "ssh");
        assert_eq!(remote.env["OPENWEATHERMAP_API_KEY"], "k");
        assert_eq!(config.server("math").unwrap().command, "/usr/local/bin/toolbox");
    }

    #[test]
    fn builtin_hosts_launch_this_executable() {
        let server = Config::default().server("tavily").unwrap();
        assert_eq!(server.name, "web-search");
        assert_eq!(server.args, ["serve", "web-search"]);
    }

    #[test]
    fn rejects_unknown_servers_and_zero_timeout() {
        assert!(matches!(
            Config::default().server("nope"),
            Err(ConfigError::UnknownServer(_))
        ));
        assert!(matches!(
            Config::parse("[client]\ntimeout_secs = 0"),
            Err(ConfigError::InvalidTimeout)
        ));
        assert!(matches!(Config::parse("client = 3"), Err(ConfigError::Parse(_))));
    }
}
