//! Upstream HTTP plumbing shared by the web-backed hosts.

use std::time::Duration;

use mcp::ToolError;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::text::truncate;

pub(crate) const USER_AGENT: &str = concat!("toolbox/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body quoted back to the caller.
const ERROR_BODY_LIMIT: usize = 200;

pub(crate) fn client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Parse a configured base URL.
pub(crate) fn base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidUrl {
            url: raw.to_string(),
            reason: "not a hierarchical URL".to_string(),
        });
    }
    Ok(url)
}

/// `base` with `segments` appended to its path, each percent-encoded.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // Only fails for cannot-be-a-base URLs, which `base_url` rejects.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// `url` with `pairs` appended to its query string.
pub(crate) fn with_query(mut url: Url, pairs: &[(&str, String)]) -> Url {
    if !pairs.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(pairs.iter().map(|(key, value)| (*key, value.as_str())));
    }
    url
}

pub(crate) async fn get_json<T: DeserializeOwned>(client: &Client, url: Url) -> Result<T, ToolError> {
    debug!(path = url.path(), "GET");
    let response = client
        .get(url)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(request_failed)?;
    decode(check_status(response).await?).await
}

pub(crate) async fn get_text(client: &Client, url: Url) -> Result<String, ToolError> {
    debug!(path = url.path(), "GET");
    let response = client.get(url).send().await.map_err(request_failed)?;
    check_status(response)
        .await?
        .text()
        .await
        .map_err(|e| ToolError::upstream(format!("failed to read response: {}", e.without_url())))
}

pub(crate) async fn post_json<B, T>(client: &Client, url: Url, body: &B) -> Result<T, ToolError>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    debug!(path = url.path(), "POST");
    let response = client
        .post(url)
        .header(ACCEPT, "application/json")
        .json(body)
        .send()
        .await
        .map_err(request_failed)?;
    decode(check_status(response).await?).await
}

// Urls carry credentials in their query, so they never reach messages.
fn request_failed(e: reqwest::Error) -> ToolError {
    let kind = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "could not connect"
    } else {
        "failed"
    };
    ToolError::upstream(format!("request {kind}: {}", e.without_url()))
}

async fn check_status(response: Response) -> Result<Response, ToolError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body = truncate(body.trim(), ERROR_BODY_LIMIT);
    if body.is_empty() {
        Err(ToolError::upstream(format!("upstream returned {status}")))
    } else {
        Err(ToolError::upstream(format!("upstream returned {status}: {body}")))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ToolError> {
    response
        .json()
        .await
        .map_err(|e| ToolError::upstream(format!("invalid response: {}", e.without_url())))
}
