//! Upstream document fetchers
//!
//! Two sources publish the schedule:
//! - the venue's social-feed posts (Graph API), one text document per post
//! - the venue's events web page, one HTML document
//!
//! Fetchers only transport; parsing happens in `services::parser`.

use crate::domain::dates::starts_with_weekday;
use crate::domain::types::Document;
use crate::infra::config::{Config, UpstreamSource};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("visit-schedule/", env!("CARGO_PKG_VERSION"));

/// Why an upstream fetch produced nothing
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("malformed upstream payload: {0}")]
    Payload(String),
    #[error("no access token configured for the posts feed")]
    MissingToken,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the current schedule documents, most recent first
    async fn fetch_documents(&self) -> Result<Vec<Document>, FetchError>;
}

fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build upstream HTTP client")
}

/// Build the fetcher selected in config
pub fn build_fetcher(config: &Config) -> anyhow::Result<Arc<dyn Fetcher>> {
    let fetcher: Arc<dyn Fetcher> = match config.upstream_source() {
        UpstreamSource::Feed => Arc::new(FeedFetcher::new(config)?),
        UpstreamSource::Page => Arc::new(PageFetcher::new(config)?),
    };
    Ok(fetcher)
}

#[derive(Debug, Deserialize)]
struct PostsPage {
    #[serde(default)]
    data: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    updated_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppCredentials {
    app_id: String,
    app_secret: String,
}

/// Resolve the feed access token: explicit value, then the app credentials
/// file (`{"app_id", "app_secret"}` -> `id|secret`), then `ACCESS_TOKEN`.
pub fn resolve_access_token(explicit: Option<&str>, auth_file: &str) -> Option<String> {
    if let Some(token) = explicit.filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    match read_app_credentials(Path::new(auth_file)) {
        Ok(creds) => return Some(format!("{}|{}", creds.app_id, creds.app_secret)),
        Err(e) => debug!(auth_file = %auth_file, error = %e, "auth_file_unavailable"),
    }
    std::env::var("ACCESS_TOKEN").ok().filter(|t| !t.is_empty())
}

fn read_app_credentials(path: &Path) -> anyhow::Result<AppCredentials> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read auth file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse auth file {}", path.display()))
}

/// Keep a post's text from its first weekday line onward.
/// Posts with no weekday line are not schedules.
pub fn schedule_text(message: &str) -> Option<String> {
    let lines: Vec<&str> = message.lines().collect();
    let start = lines.iter().position(|line| starts_with_weekday(line.trim()))?;
    Some(lines[start..].join("\n"))
}

/// Turn a Graph API posts page into text documents, newest first
pub fn posts_to_documents(body: &str) -> Result<Vec<Document>, FetchError> {
    let page: PostsPage =
        serde_json::from_str(body).map_err(|e| FetchError::Payload(e.to_string()))?;

    let documents: Vec<Document> = page
        .data
        .into_iter()
        .filter_map(|post| {
            let Some(message) = post.message else {
                debug!(updated_time = ?post.updated_time, "feed_post_without_message");
                return None;
            };
            schedule_text(&message).map(Document::Text)
        })
        .collect();
    Ok(documents)
}

/// Posts feed of the venue page
pub struct FeedFetcher {
    client: reqwest::Client,
    posts_url: String,
    page_id: String,
    post_limit: u32,
    access_token: Option<String>,
}

impl FeedFetcher {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let access_token = resolve_access_token(config.access_token(), config.auth_file());
        if access_token.is_none() {
            warn!("feed_access_token_missing");
        }
        Ok(Self {
            client: http_client(config.upstream_timeout())?,
            posts_url: format!("{}/posts", config.graph_url().trim_end_matches('/')),
            page_id: config.page_id().to_string(),
            post_limit: config.post_limit(),
            access_token,
        })
    }
}

#[async_trait]
impl Fetcher for FeedFetcher {
    async fn fetch_documents(&self) -> Result<Vec<Document>, FetchError> {
        let token = self.access_token.as_deref().ok_or(FetchError::MissingToken)?;
        let limit = self.post_limit.to_string();

        let response = self
            .client
            .get(&self.posts_url)
            .query(&[
                ("format", "json"),
                ("id", self.page_id.as_str()),
                ("access_token", token),
                ("fields", "updated_time,message"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let documents = posts_to_documents(&response.text().await?)?;
        info!(page_id = %self.page_id, documents = %documents.len(), "feed_fetched");
        Ok(documents)
    }
}

/// Events web page
pub struct PageFetcher {
    client: reqwest::Client,
    url: String,
}

impl PageFetcher {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self { client: http_client(config.upstream_timeout())?, url: config.page_url().to_string() })
    }
}

#[async_trait]
impl Fetcher for PageFetcher {
    async fn fetch_documents(&self) -> Result<Vec<Document>, FetchError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        info!(url = %self.url, bytes = %body.len(), "page_fetched");
        Ok(vec![Document::Markup(body)])
    }
}
