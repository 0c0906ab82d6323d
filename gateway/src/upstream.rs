use crate::config::UpstreamConfig;
use crate::metrics_defs::{UPSTREAM_FAILURES, UPSTREAM_REQUESTS};
use crate::types::RepositoryRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use shared::counter;
use std::time::Duration;
use url::Url;

/// Number of records requested per upstream page. A shorter page means the
/// upstream has nothing more for that query.
pub const PAGE_SIZE: usize = 100;

const ACCEPT_GITHUB_V3: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("repohub/", env!("CARGO_PKG_VERSION"));

#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("upstream unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("upstream rejected the request with status {status}")]
    Rejected { status: StatusCode },
    #[error("could not decode upstream response: {0}")]
    DecodeFailed(#[from] serde_json::Error),
}

/// One page request against the upstream API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageQuery {
    /// Public repositories of an organization, newest first. The listing
    /// endpoint has no language or license filters.
    Organization { org: String, page: u32 },
    /// Repository search restricted to repositories created on or after
    /// `created_from`.
    Search {
        created_from: NaiveDate,
        language: Option<String>,
        license: Option<String>,
        page: u32,
    },
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        match self {
            PageQuery::Organization { page, .. } | PageQuery::Search { page, .. } => *page,
        }
    }

    /// Builds the full request URL relative to the API base URL.
    pub fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();

        match self {
            PageQuery::Organization { org, page } => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().extend(["orgs", org.as_str(), "repos"]);
                }
                url.query_pairs_mut()
                    .clear()
                    .append_pair("sort", "created")
                    .append_pair("type", "public")
                    .append_pair("per_page", &PAGE_SIZE.to_string())
                    .append_pair("page", &page.to_string());
            }
            PageQuery::Search {
                created_from,
                language,
                license,
                page,
            } => {
                let mut terms = vec![format!("created:>={created_from}")];
                if let Some(language) = language {
                    terms.push(format!("language:{language}"));
                }
                if let Some(license) = license {
                    terms.push(format!("license:{license}"));
                }

                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().extend(["search", "repositories"]);
                }
                url.query_pairs_mut()
                    .clear()
                    .append_pair("q", &terms.join(" "))
                    .append_pair("sort", "created")
                    .append_pair("per_page", &PAGE_SIZE.to_string())
                    .append_pair("page", &page.to_string());
            }
        }

        url
    }
}

/// Anything that can serve repository pages. The accumulator only talks to
/// the upstream through this trait.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<RepositoryRecord>, UpstreamError>;
}

#[derive(Deserialize)]
struct SearchEnvelope {
    total_count: u64,
    items: Vec<RepositoryRecord>,
}

/// Client for the GitHub REST API.
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl GitHubClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_GITHUB_V3));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(GitHubClient {
            client,
            base_url: config.url.clone(),
            token: config.token.clone(),
        })
    }

    async fn send(&self, query: &PageQuery) -> Result<Vec<RepositoryRecord>, UpstreamError> {
        let url = query.url(&self.base_url);
        tracing::debug!(url = url.as_str(), "requesting upstream page");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(UpstreamError::Unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Rejected { status });
        }

        let body = response.bytes().await.map_err(UpstreamError::Unreachable)?;

        let records = match query {
            PageQuery::Organization { .. } => serde_json::from_slice::<Vec<RepositoryRecord>>(&body)?,
            PageQuery::Search { .. } => {
                let envelope: SearchEnvelope = serde_json::from_slice(&body)?;
                tracing::debug!(
                    total_count = envelope.total_count,
                    returned = envelope.items.len(),
                    "search page decoded"
                );
                envelope.items
            }
        };

        Ok(records)
    }
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<RepositoryRecord>, UpstreamError> {
        counter!(UPSTREAM_REQUESTS).increment(1);

        let result = self.send(query).await;
        if let Err(e) = &result {
            counter!(UPSTREAM_FAILURES).increment(1);
            tracing::debug!(error = %e, page = query.page(), "upstream page request failed");
        }
        result
    }
}
