//! Query client
//!
//! Issues the initial query and follows continuation cursors. Every call is
//! authenticated with the run's bearer token and goes to the token's
//! instance URL.

use super::types::{NextPage, Page};
use crate::auth::AccessToken;
use crate::error::{Error, Result};
use crate::http::{join_url, HttpClient, HttpClientConfig, RequestConfig};
use async_trait::async_trait;
use futures::Stream;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

/// Default REST API version
pub const DEFAULT_API_VERSION: &str = "v55.0";

/// Source of query result pages
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Run the query and return its first page
    async fn execute_query(&self, query: &str, token: &AccessToken) -> Result<Page>;

    /// Fetch the page behind a server-issued cursor
    async fn continue_pagination(&self, cursor: &str, token: &AccessToken) -> Result<Page>;
}

/// REST query client
pub struct QueryClient {
    http: HttpClient,
    api_version: String,
}

impl QueryClient {
    /// Create a client for the given API version
    pub fn new(api_version: impl Into<String>, http_config: HttpClientConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::with_config(http_config)?,
            api_version: api_version.into(),
        })
    }

    /// Path of the query resource
    pub fn query_path(&self) -> String {
        format!("/services/data/{}/query/", self.api_version)
    }

    async fn fetch(&self, url: &str, request: RequestConfig) -> Result<Page> {
        let body: Value = self
            .http
            .request_json(Method::GET, url, request)
            .await
            .map_err(Error::into_api)?;
        Page::from_body(body).map_err(Error::into_api)
    }
}

#[async_trait]
impl PageSource for QueryClient {
    async fn execute_query(&self, query: &str, token: &AccessToken) -> Result<Page> {
        let url = join_url(&token.instance_url, &self.query_path());
        debug!(%url, "Executing query");
        let request = RequestConfig::new().query("q", query).bearer(&token.token);
        self.fetch(&url, request).await
    }

    async fn continue_pagination(&self, cursor: &str, token: &AccessToken) -> Result<Page> {
        // The cursor is used verbatim
        let url = join_url(&token.instance_url, cursor);
        debug!(%url, "Following cursor");
        let request = RequestConfig::new().bearer(&token.token);
        self.fetch(&url, request).await
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("api_version", &self.api_version)
            .field("http", &self.http)
            .finish()
    }
}

enum Position {
    Start,
    Cursor(String),
    Exhausted,
}

/// Lazily page through a query
///
/// Nothing is fetched until the stream is polled, and each poll fetches at
/// most one page. The stream ends after the first page without a cursor, or
/// right after yielding an error.
pub fn pages<'a>(
    source: &'a dyn PageSource,
    query: &'a str,
    token: &'a AccessToken,
) -> impl Stream<Item = Result<Page>> + Send + 'a {
    futures::stream::try_unfold(Position::Start, move |position| async move {
        let page = match position {
            Position::Start => source.execute_query(query, token).await?,
            Position::Cursor(cursor) => source.continue_pagination(&cursor, token).await?,
            Position::Exhausted => return Ok(None),
        };

        let next = match page.next_page() {
            NextPage::Continue { cursor } => {
                if page.done {
                    debug!(%cursor, "Page marked done but carries a cursor, following it");
                }
                Position::Cursor(cursor)
            }
            NextPage::Done => {
                if page.is_inconsistent() {
                    warn!("Page has no cursor but is not marked done, treating as last page");
                }
                Position::Exhausted
            }
        };

        Ok::<_, Error>(Some((page, next)))
    })
}
