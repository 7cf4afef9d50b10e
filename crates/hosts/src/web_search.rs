//! Web search host backed by the Tavily API.

use std::sync::Arc;

use mcp::{Arguments, Param, ParamKind, ToolDescriptor, ToolError, ToolRegistry};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::http;
use crate::settings::Settings;

/// How far back `search_news` looks.
const NEWS_DAYS: u32 = 7;

pub fn registry(settings: &Settings) -> Result<ToolRegistry> {
    let api = Arc::new(TavilyApi::new(settings)?);
    let mut registry = ToolRegistry::new().with_call_timeout(settings.call_timeout);

    registry.register(
        query("search", "Search the web using Tavily API."),
        crate::bind(&api, TavilyApi::search),
    )?;
    registry.register(
        query("search_news", "Search for news articles using Tavily API."),
        crate::bind(&api, TavilyApi::search_news),
    )?;
    Ok(registry)
}

fn query(name: &str, description: &str) -> ToolDescriptor {
    ToolDescriptor::new(name, description)
        .param(Param::required("query", ParamKind::String).describe("Search query string"))
        .param(
            Param::optional("max_results", ParamKind::Integer)
                .describe("Maximum number of results to return (default: 5)")
                .with_default(5),
        )
}

struct TavilyApi {
    http: Client,
    search_url: Url,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    search_depth: &'static str,
    include_answer: bool,
    include_images: bool,
    include_raw_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

impl SearchResult {
    fn render(&self) -> String {
        format!(
            "Title: {}\nURL: {}\nContent: {}\nScore: {}",
            self.title.as_deref().unwrap_or("No title"),
            self.url.as_deref().unwrap_or("No URL"),
            self.content.as_deref().unwrap_or("No content available"),
            self.score
                .map_or_else(|| "N/A".to_string(), |s| s.to_string()),
        )
    }
}

/// Labels for one flavor of search output.
struct Labels {
    answer: &'static str,
    results: &'static str,
    empty: &'static str,
}

const WEB: Labels = Labels {
    answer: "Answer",
    results: "Search Results",
    empty: "No search results found.",
};

const NEWS: Labels = Labels {
    answer: "News Summary",
    results: "News Results",
    empty: "No news results found.",
};

impl TavilyApi {
    fn new(settings: &Settings) -> Result<Self> {
        let api_key = settings
            .tavily_api_key
            .clone()
            .ok_or(Error::MissingCredential("TAVILY_API_KEY"))?;
        let base = http::base_url(&settings.tavily_api_base)?;
        Ok(Self {
            http: http::client(settings.http_timeout)?,
            search_url: http::endpoint(&base, &["search"]),
            api_key,
        })
    }

    async fn run(&self, args: &Arguments, days: Option<u32>, labels: &Labels) -> Result<String, ToolError> {
        let request = SearchRequest {
            api_key: &self.api_key,
            query: args.str("query")?,
            max_results: crate::limit(args, "max_results")?,
            search_depth: "basic",
            include_answer: true,
            include_images: false,
            include_raw_content: false,
            days,
        };
        let response: SearchResponse =
            http::post_json(&self.http, self.search_url.clone(), &request).await?;

        if response.results.is_empty() {
            return Ok(labels.empty.to_string());
        }

        let results = response
            .results
            .iter()
            .map(SearchResult::render)
            .collect::<Vec<_>>()
            .join("\n---\n");
        Ok(match response.answer.as_deref().filter(|a| !a.is_empty()) {
            Some(answer) => format!(
                "{}: {answer}\n\n{}:\n{results}",
                labels.answer, labels.results
            ),
            None => format!("{}:\n{results}", labels.results),
        })
    }

    async fn search(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        self.run(&args, None, &WEB).await
    }

    async fn search_news(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        self.run(&args, Some(NEWS_DAYS), &NEWS).await
    }
}
