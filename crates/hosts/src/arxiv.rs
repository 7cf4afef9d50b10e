//! arXiv host backed by the Atom query API.

use std::sync::Arc;

use chrono::DateTime;
use mcp::{Arguments, Param, ParamKind, ToolDescriptor, ToolError, ToolRegistry};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use reqwest::Client;
use url::Url;

use crate::error::Result;
use crate::http;
use crate::settings::Settings;
use crate::text::{collapse_whitespace, ellipsize};

/// Summaries longer than this are cut and marked with `...`.
const SUMMARY_LIMIT: usize = 500;

pub fn registry(settings: &Settings) -> Result<ToolRegistry> {
    let api = Arc::new(ArxivApi::new(settings)?);
    let mut registry = ToolRegistry::new().with_call_timeout(settings.call_timeout);

    registry.register(
        search("search_papers", "Search for research papers on ArXiv.")
            .param(Param::required("query", ParamKind::String).describe("Search query string")),
        crate::bind(&api, ArxivApi::search_papers),
    )?;
    registry.register(
        search("search_by_author", "Search for papers by a specific author.").param(
            Param::required("author", ParamKind::String).describe("Author name to search for"),
        ),
        crate::bind(&api, ArxivApi::search_by_author),
    )?;
    registry.register(
        search("search_by_category", "Search for papers in a specific category.").param(
            Param::required("category", ParamKind::String)
                .describe("ArXiv category (e.g., cs.AI, math.CO, physics.gen-ph)"),
        ),
        crate::bind(&api, ArxivApi::search_by_category),
    )?;
    Ok(registry)
}

fn search(name: &str, description: &str) -> ToolDescriptor {
    ToolDescriptor::new(name, description).param(
        Param::optional("max_results", ParamKind::Integer)
            .describe("Maximum number of results to return (default: 5)")
            .with_default(5),
    )
}

#[derive(Debug, Clone, Copy)]
enum SortBy {
    Relevance,
    SubmittedDate,
}

impl SortBy {
    fn as_str(self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::SubmittedDate => "submittedDate",
        }
    }
}

struct ArxivApi {
    http: Client,
    base: Url,
}

impl ArxivApi {
    fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            http: http::client(settings.http_timeout)?,
            base: http::base_url(&settings.arxiv_api_base)?,
        })
    }

    async fn query(
        &self,
        search_query: String,
        max_results: u32,
        sort_by: SortBy,
    ) -> Result<Vec<Paper>, ToolError> {
        let url = http::with_query(
            self.base.clone(),
            &[
                ("search_query", search_query),
                ("start", "0".to_string()),
                ("max_results", max_results.to_string()),
                ("sortBy", sort_by.as_str().to_string()),
                ("sortOrder", "descending".to_string()),
            ],
        );
        let feed = http::get_text(&self.http, url).await?;
        parse_feed(&feed).map_err(|e| ToolError::upstream(format!("Failed to parse arXiv response: {e}")))
    }

    async fn search_papers(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        let query = args.str("query")?;
        let papers = self
            .query(format!("all:{query}"), crate::limit(&args, "max_results")?, SortBy::Relevance)
            .await?;
        if papers.is_empty() {
            return Ok("No papers found.".to_string());
        }
        Ok(render(&papers))
    }

    async fn search_by_author(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        let author = args.str("author")?;
        let papers = self
            .query(
                format!("au:{author}"),
                crate::limit(&args, "max_results")?,
                SortBy::SubmittedDate,
            )
            .await?;
        if papers.is_empty() {
            return Ok(format!("No papers found for author: {author}"));
        }
        Ok(format!("Papers by {author}:\n\n{}", render(&papers)))
    }

    async fn search_by_category(self: Arc<Self>, args: Arguments) -> Result<String, ToolError> {
        let category = args.str("category")?;
        let papers = self
            .query(
                format!("cat:{category}"),
                crate::limit(&args, "max_results")?,
                SortBy::SubmittedDate,
            )
            .await?;
        if papers.is_empty() {
            return Ok(format!("No papers found in category: {category}"));
        }
        Ok(format!("Recent papers in {category}:\n\n{}", render(&papers)))
    }
}

/// One `<entry>` of an arXiv Atom feed.
#[derive(Debug, Default, Clone, PartialEq)]
struct Paper {
    title: String,
    authors: Vec<String>,
    summary: String,
    published: String,
    url: String,
    categories: Vec<String>,
}

impl Paper {
    fn arxiv_id(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or("Unknown")
    }

    /// `YYYY-MM-DD`, or the raw timestamp when it does not parse.
    fn published_date(&self) -> String {
        match DateTime::parse_from_rfc3339(&self.published) {
            Ok(date) => date.format("%Y-%m-%d").to_string(),
            Err(_) if self.published.is_empty() => "Unknown".to_string(),
            Err(_) => self.published.clone(),
        }
    }

    fn render(&self) -> String {
        let or = |list: &[String], fallback: &str| {
            if list.is_empty() {
                fallback.to_string()
            } else {
                list.join(", ")
            }
        };
        format!(
            "Title: {}\nAuthors: {}\nArXiv ID: {}\nPublished: {}\nCategories: {}\nURL: {}\nSummary: {}",
            self.title,
            or(&self.authors, "No authors"),
            self.arxiv_id(),
            self.published_date(),
            or(&self.categories, "No categories"),
            self.url,
            ellipsize(&self.summary, SUMMARY_LIMIT),
        )
    }
}

fn render(papers: &[Paper]) -> String {
    papers
        .iter()
        .map(Paper::render)
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Element of an entry whose text we keep.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Summary,
    Published,
    Id,
    AuthorName,
}

fn parse_feed(xml: &str) -> std::result::Result<Vec<Paper>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut entry: Option<Paper> = None;
    let mut in_author = false;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let Some(paper) = entry.as_mut() else {
                    if e.local_name().as_ref() == b"entry" {
                        entry = Some(Paper::default());
                    }
                    continue;
                };
                text.clear();
                field = match e.local_name().as_ref() {
                    b"title" => Some(Field::Title),
                    b"summary" => Some(Field::Summary),
                    b"published" => Some(Field::Published),
                    b"id" => Some(Field::Id),
                    b"name" if in_author => Some(Field::AuthorName),
                    b"author" => {
                        in_author = true;
                        None
                    }
                    b"category" => {
                        push_category(paper, &e)?;
                        None
                    }
                    _ => None,
                };
            }
            Event::Empty(e) => {
                if let Some(paper) = entry.as_mut() {
                    if e.local_name().as_ref() == b"category" {
                        push_category(paper, &e)?;
                    }
                }
            }
            Event::Text(t) if field.is_some() => text.push_str(&t.unescape()?),
            Event::CData(c) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(e) => {
                let Some(paper) = entry.as_mut() else {
                    continue;
                };
                if let Some(done) = field.take() {
                    let value = collapse_whitespace(&text);
                    match done {
                        Field::Title => paper.title = value,
                        Field::Summary => paper.summary = value,
                        Field::Published => paper.published = value,
                        Field::Id => paper.url = value,
                        Field::AuthorName => paper.authors.push(value),
                    }
                }
                match e.local_name().as_ref() {
                    b"entry" => {
                        papers.extend(entry.take());
                        in_author = false;
                    }
                    b"author" => in_author = false,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    for paper in &mut papers {
        if paper.title.is_empty() {
            paper.title = "No title".to_string();
        }
        if paper.summary.is_empty() {
            paper.summary = "No summary".to_string();
        }
    }
    Ok(papers)
}

fn push_category(paper: &mut Paper, element: &BytesStart<'_>) -> std::result::Result<(), quick_xml::Error> {
    if let Some(term) = element.try_get_attribute("term")? {
        paper.categories.push(term.unescape_value()?.into_owned());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=all:attention</title>
  <id>http://arxiv.org/api/query-id</id>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models &amp; more.  </summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name><arxiv:affiliation>Google</arxiv:affiliation></author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    const EMPTY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>ArXiv Query</title></feed>"#;

    fn args(value: Value) -> Option<Map<String, Value>> {
        value.as_object().cloned()
    }

    #[test]
    fn parses_atom_entries() {
        let papers = parse_feed(FEED).unwrap();
        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        assert_eq!(paper.title, "Attention Is All You Need");
        assert_eq!(paper.authors, ["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(paper.summary, "The dominant sequence transduction models & more.");
        assert_eq!(paper.categories, ["cs.CL", "cs.LG"]);
        assert_eq!(paper.arxiv_id(), "1706.03762v7");
        assert_eq!(paper.published_date(), "2017-06-12");
    }

    #[test]
    fn long_summaries_are_cut() {
        let paper = Paper {
            summary: "x".repeat(600),
            ..Paper::default()
        };
        let rendered = paper.render();
        let summary = rendered.rsplit("Summary: ").next().unwrap();
        assert_eq!(summary.len(), SUMMARY_LIMIT + 3);
        assert!(summary.ends_with("..."));
        assert!(rendered.contains("Authors: No authors"));
    }

    #[test]
    fn malformed_feed_is_an_error() {
        assert!(parse_feed("<feed><entry><title>x</entry></feed>").is_err());
    }

    #[tokio::test]
    async fn author_search_queries_the_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "au:Vaswani"))
            .and(query_param("max_results", "3"))
            .and(query_param("sortBy", "submittedDate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let text = registry(&Settings::default().with_base(&server.uri()))
            .unwrap()
            .invoke("search_by_author", args(json!({"author": "Vaswani", "max_results": 3})))
            .await
            .unwrap();

        assert!(text.starts_with("Papers by Vaswani:\n\nTitle: Attention Is All You Need"));
        assert!(text.contains("ArXiv ID: 1706.03762v7"));
        assert!(text.contains("Categories: cs.CL, cs.LG"));
    }

    #[tokio::test]
    async fn empty_feed_is_a_normal_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_FEED))
            .mount(&server)
            .await;

        let result = registry(&Settings::default().with_base(&server.uri()))
            .unwrap()
            .dispatch("search_papers", args(json!({"query": "nothing"})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), "No papers found.");
    }

    #[tokio::test]
    async fn zero_max_results_is_rejected() {
        let registry = registry(&Settings::default()).unwrap();
        let err = registry
            .invoke("search_papers", args(json!({"query": "x", "max_results": 0})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { field, .. } if field == "max_results"));
    }
}
