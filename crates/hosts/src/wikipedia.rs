//! Wikipedia host backed by the public REST and action APIs.

use std::sync::Arc;

use mcp::{Arguments, Param, ParamKind, ToolDescriptor, ToolError, ToolRegistry};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::Result;
use crate::http;
use crate::settings::Settings;
use crate::text::{collapse_whitespace, html_to_text, wiki_title};

const PAGE_BASE: &str = "https://en.wikipedia.org/wiki/";

pub fn registry(settings: &Settings) -> Result<ToolRegistry> {
    let api = Arc::new(WikipediaApi::new(settings)?);
    let mut registry = ToolRegistry::new().with_call_timeout(settings.call_timeout);

    registry.register(
        ToolDescriptor::new("search_wikipedia", "Search Wikipedia articles.")
            .param(Param::required("query", ParamKind::String).describe("Search query string"))
            .param(
                Param::optional("limit", ParamKind::Integer)
                    .describe("Maximum number of results to return (default: 5)")
                    .with_default(5),
            ),
        crate::bind(&api, WikipediaApi::search),
    )?;
    registry.register(
        ToolDescriptor::new("get_wikipedia_summary", "Get a summary of a Wikipedia article.")
            .param(title_param()),
        crate::bind(&api, WikipediaApi::summary_tool),
    )?;
    registry.register(
        ToolDescriptor::new(
            "get_wikipedia_content",
            "Get the full content of a Wikipedia article or specific section.",
        )
        .param(title_param())
        .param(
            Param::optional("section", ParamKind::String)
                .describe("Optional section number or title to retrieve specific section"),
        ),
        crate::bind(&api, WikipediaApi::content),
    )?;
    registry.register(
        ToolDescriptor::new("get_random_wikipedia", "Get a random Wikipedia article summary."),
        crate::bind(&api, WikipediaApi::random),
    )?;
    Ok(registry)
}

fn title_param() -> Param {
    Param::required("title", ParamKind::String).describe("Title of the Wikipedia article")
}

struct WikipediaApi {
    http: Client,
    rest: Url,
    action: Url,
}

impl WikipediaApi {
    fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            http: http::client(settings.http_timeout)?,
            rest: http::base_url(&settings.wikipedia_api_base)?,
            action: http::base_url(&settings.wikipedia_search_base)?,
        })
    }

    async fn query(&self, mut pairs: Vec<(&str, String)>) -> Result<QueryResult, ToolError> {
        pairs.insert(0, ("action", "query".to_string()));
        pairs.insert(1, ("format", "json".to_string()));
        let url = http::with_query(self.action.clone(), &pairs);
        let response: QueryResponse = http::get_json(&self.http, url).await?;
        response
            .query
            .ok_or_else(|| ToolError::upstream("Wikipedia returned no query result"))
    }

    async fn search(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        let query = args.str("query")?;
        let limit = crate::limit(&args, "limit")?;
        let result = self
            .query(vec![
                ("list", "search".to_string()),
                ("srsearch", query.to_string()),
                ("srlimit", limit.to_string()),
                ("srprop", "snippet|titlesnippet|size|timestamp".to_string()),
            ])
            .await?;

        if result.search.is_empty() {
            return Ok(format!("No Wikipedia articles found for: {query}"));
        }

        let hits: Vec<String> = result
            .search
            .iter()
            .map(|hit| {
                let size = hit
                    .size
                    .map_or_else(|| "Unknown".to_string(), |s| s.to_string());
                format!(
                    "Title: {}\nSnippet: {}\nSize: {size} bytes\nURL: {PAGE_BASE}{}",
                    hit.title,
                    html_to_text(&hit.snippet),
                    wiki_title(&hit.title),
                )
            })
            .collect();
        Ok(hits.join("\n---\n"))
    }

    async fn summary_tool(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        self.summary(args.str("title")?).await
    }

    async fn summary(&self, title: &str) -> Result<String, ToolError> {
        let page = wiki_title(title);
        let url = http::endpoint(&self.rest, &["page", "summary", &page]);
        let summary: Summary = http::get_json(&self.http, url).await?;

        if summary.kind.as_deref() == Some("disambiguation") {
            return Ok(format!(
                "'{title}' is a disambiguation page. Please be more specific with your search."
            ));
        }
        let Some(extract) = summary.extract.as_deref() else {
            return Ok(format!("No summary available for: {title}"));
        };

        let link = summary
            .content_urls
            .and_then(|urls| urls.desktop)
            .map_or_else(|| format!("{PAGE_BASE}{page}"), |desktop| desktop.page);
        let mut text = format!(
            "Title: {}\nSummary: {}\nURL: {link}",
            summary.title.as_deref().unwrap_or(title),
            collapse_whitespace(extract),
        );
        if let Some(thumbnail) = summary.thumbnail {
            text.push_str(&format!("\nThumbnail: {}", thumbnail.source));
        }
        Ok(text)
    }

    async fn content(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        let title = args.str("title")?;
        let section = match args.opt_str("section").map(str::trim) {
            Some(section) if !section.is_empty() => section,
            // Full article HTML is too large to return; summarize instead.
            _ => return self.summary(title).await,
        };

        let page = wiki_title(title);
        let url = http::endpoint(&self.rest, &["page", "mobile-sections", &page]);
        let sections = http::get_json::<MobileSections>(&self.http, url)
            .await?
            .into_sections();
        if sections.is_empty() {
            return Ok(format!("No sections found for: {title}"));
        }

        if let Ok(index) = section.parse::<usize>() {
            return Ok(match sections.get(index) {
                Some(found) => format!(
                    "Section {index}: {}\n\n{}",
                    found.heading(),
                    found.body()
                ),
                None => format!(
                    "Section {section} not found. Article has {} sections.",
                    sections.len()
                ),
            });
        }

        let wanted = section.to_lowercase();
        let found = sections.iter().find(|s| {
            s.line
                .as_deref()
                .is_some_and(|line| line.to_lowercase().contains(&wanted))
        });
        Ok(match found {
            Some(found) => format!("Section: {}\n\n{}", found.heading(), found.body()),
            None => format!("Section '{section}' not found."),
        })
    }

    async fn random(self: Arc<Self>, _args: Arguments) -> Result<String, ToolError> {
        let result = self
            .query(vec![
                ("list", "random".to_string()),
                ("rnnamespace", "0".to_string()),
                ("rnlimit", "1".to_string()),
            ])
            .await?;
        let page = result
            .random
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::upstream("Wikipedia returned no random article"))?;
        self.summary(&page.title).await
    }
}

// --- Upstream shapes ---

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    search: Vec<SearchHit>,
    #[serde(default)]
    random: Vec<RandomPage>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RandomPage {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
    #[serde(default)]
    thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    #[serde(default)]
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: String,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: String,
}

/// `page/mobile-sections` response. Older deployments list `sections`
/// directly, newer ones split them into `lead` and `remaining`.
#[derive(Debug, Deserialize)]
struct MobileSections {
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    lead: Option<SectionList>,
    #[serde(default)]
    remaining: Option<SectionList>,
}

#[derive(Debug, Deserialize)]
struct SectionList {
    #[serde(default)]
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    #[serde(default)]
    line: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl MobileSections {
    fn into_sections(self) -> Vec<Section> {
        if !self.sections.is_empty() {
            return self.sections;
        }
        self.lead
            .into_iter()
            .chain(self.remaining)
            .flat_map(|list| list.sections)
            .collect()
    }
}

impl Section {
    fn heading(&self) -> String {
        self.line
            .as_deref()
            .map_or_else(|| "Unknown".to_string(), html_to_text)
    }

    fn body(&self) -> String {
        self.text
            .as_deref()
            .map_or_else(|| "No content".to_string(), html_to_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn args(value: Value) -> Option<Map<String, Value>> {
        value.as_object().cloned()
    }

    async fn host(server: &MockServer) -> ToolRegistry {
        registry(&Settings::default().with_base(&server.uri())).unwrap()
    }

    async fn mount_summary(server: &MockServer, page: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/page/summary/{page}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn search_formats_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("list", "search"))
            .and(query_param("srsearch", "rust language"))
            .and(query_param("srlimit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"search": [{
                    "title": "Rust (programming language)",
                    "snippet": "<span class=\"searchmatch\">Rust</span> is a   general-purpose language",
                    "size": 12345
                }]}
            })))
            .mount(&server)
            .await;

        let text = host(&server)
            .await
            .invoke("search_wikipedia", args(json!({"query": "rust language", "limit": 2})))
            .await
            .unwrap();

        assert!(text.contains("Title: Rust (programming language)"));
        assert!(text.contains("Snippet: Rust is a general-purpose language"));
        assert!(text.contains("Size: 12345 bytes"));
        assert!(text.contains("URL: https://en.wikipedia.org/wiki/Rust_(programming_language)"));
    }

    #[tokio::test]
    async fn empty_search_is_a_normal_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"query": {"search": []}})))
            .mount(&server)
            .await;

        let result = host(&server)
            .await
            .dispatch("search_wikipedia", args(json!({"query": "zzzz"})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), "No Wikipedia articles found for: zzzz");
    }

    #[tokio::test]
    async fn summary_uses_underscored_title() {
        let server = MockServer::start().await;
        mount_summary(
            &server,
            "Alan_Turing",
            json!({
                "type": "standard",
                "title": "Alan Turing",
                "extract": "Alan Mathison Turing was an English\nmathematician.",
                "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Alan_Turing"}},
                "thumbnail": {"source": "https://upload.example/turing.jpg"}
            }),
        )
        .await;

        let text = host(&server)
            .await
            .invoke("get_wikipedia_summary", args(json!({"title": "Alan Turing"})))
            .await
            .unwrap();

        assert_eq!(
            text,
            "Title: Alan Turing\n\
             Summary: Alan Mathison Turing was an English mathematician.\n\
             URL: https://en.wikipedia.org/wiki/Alan_Turing\n\
             Thumbnail: https://upload.example/turing.jpg"
        );
    }

    #[tokio::test]
    async fn disambiguation_pages_ask_for_detail() {
        let server = MockServer::start().await;
        mount_summary(&server, "Mercury", json!({"type": "disambiguation", "title": "Mercury"})).await;

        let text = host(&server)
            .await
            .invoke("get_wikipedia_summary", args(json!({"title": "Mercury"})))
            .await
            .unwrap();
        assert!(text.contains("disambiguation page"));
    }

    #[tokio::test]
    async fn content_selects_sections_by_index_or_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page/mobile-sections/Rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "lead": {"sections": [{"id": 0, "text": "<p>Lead text.</p>"}]},
                "remaining": {"sections": [
                    {"id": 1, "line": "History", "text": "<p>Started in 2006.</p>"},
                    {"id": 2, "line": "Syntax and semantics", "text": "<p>Braces.</p>"}
                ]}
            })))
            .mount(&server)
            .await;
        let registry = host(&server).await;

        let by_index = registry
            .invoke("get_wikipedia_content", args(json!({"title": "Rust", "section": "1"})))
            .await
            .unwrap();
        assert_eq!(by_index, "Section 1: History\n\nStarted in 2006.");

        let by_name = registry
            .invoke("get_wikipedia_content", args(json!({"title": "Rust", "section": "syntax"})))
            .await
            .unwrap();
        assert_eq!(by_name, "Section: Syntax and semantics\n\nBraces.");

        let missing = registry
            .invoke("get_wikipedia_content", args(json!({"title": "Rust", "section": "9"})))
            .await
            .unwrap();
        assert_eq!(missing, "Section 9 not found. Article has 3 sections.");
    }

    #[tokio::test]
    async fn random_article_is_summarized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("list", "random"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"random": [{"id": 1, "ns": 0, "title": "Lake Baikal"}]}
            })))
            .mount(&server)
            .await;
        mount_summary(
            &server,
            "Lake_Baikal",
            json!({"title": "Lake Baikal", "extract": "A rift lake in Russia."}),
        )
        .await;

        let text = host(&server)
            .await
            .invoke("get_random_wikipedia", None)
            .await
            .unwrap();
        assert!(text.starts_with("Title: Lake Baikal\nSummary: A rift lake in Russia."));
        assert!(text.contains("URL: https://en.wikipedia.org/wiki/Lake_Baikal"));
    }

    #[tokio::test]
    async fn missing_article_is_an_error_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = host(&server)
            .await
            .dispatch("get_wikipedia_summary", args(json!({"title": "No Such Page"})))
            .await;
        assert!(result.is_error);
        assert!(result.joined_text().contains("404"));
    }
}
