//! Startup settings shared by the hosts.

use std::time::Duration;

pub const OPENWEATHERMAP_API_BASE: &str = "https://api.openweathermap.org/data/2.5";
pub const WIKIPEDIA_API_BASE: &str = "https://en.wikipedia.org/api/rest_v1";
pub const WIKIPEDIA_SEARCH_BASE: &str = "https://en.wikipedia.org/w/api.php";
pub const ARXIV_API_BASE: &str = "http://export.arxiv.org/api/query";
pub const TAVILY_API_BASE: &str = "https://api.tavily.com";

/// Timeout for a single upstream HTTP request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on one tool call, including every request it makes.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(40);

/// Credentials and upstream endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub openweathermap_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub openweathermap_api_base: String,
    pub wikipedia_api_base: String,
    pub wikipedia_search_base: String,
    pub arxiv_api_base: String,
    pub tavily_api_base: String,
    pub http_timeout: Duration,
    pub call_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openweathermap_api_key: None,
            tavily_api_key: None,
            openweathermap_api_base: OPENWEATHERMAP_API_BASE.to_string(),
            wikipedia_api_base: WIKIPEDIA_API_BASE.to_string(),
            wikipedia_search_base: WIKIPEDIA_SEARCH_BASE.to_string(),
            arxiv_api_base: ARXIV_API_BASE.to_string(),
            tavily_api_base: TAVILY_API_BASE.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            openweathermap_api_key: var("OPENWEATHERMAP_API_KEY"),
            tavily_api_key: var("TAVILY_API_KEY"),
            openweathermap_api_base: var("OPENWEATHERMAP_API_BASE")
                .unwrap_or(defaults.openweathermap_api_base),
            wikipedia_api_base: var("WIKIPEDIA_API_BASE").unwrap_or(defaults.wikipedia_api_base),
            wikipedia_search_base: var("WIKIPEDIA_SEARCH_BASE")
                .unwrap_or(defaults.wikipedia_search_base),
            arxiv_api_base: var("ARXIV_API_BASE").unwrap_or(defaults.arxiv_api_base),
            tavily_api_base: var("TAVILY_API_BASE").unwrap_or(defaults.tavily_api_base),
            ..defaults
        }
    }

    /// Point every upstream at `base` (tests).
    pub fn with_base(mut self, base: &str) -> Self {
        self.openweathermap_api_base = base.to_string();
        self.wikipedia_api_base = base.to_string();
        self.wikipedia_search_base = format!("{base}/w/api.php");
        self.arxiv_api_base = format!("{base}/api/query");
        self.tavily_api_base = base.to_string();
        self
    }
}
