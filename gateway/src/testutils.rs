use crate::config::Config;
use crate::types::{License, Owner, RepositoryRecord};
use crate::upstream::{PageQuery, RepositorySource, UpstreamError};
use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::ops::Range;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

pub fn record(full_name: &str, language: Option<&str>, license: Option<&str>) -> RepositoryRecord {
    let login = full_name.split('/').next().unwrap_or(full_name);
    RepositoryRecord {
        full_name: full_name.to_string(),
        description: Some(format!("{full_name} description")),
        html_url: format!("https://github.com/{full_name}"),
        language: language.map(String::from),
        license: license.map(|key| License {
            key: key.to_string(),
            name: key.to_uppercase(),
        }),
        owner: Owner {
            login: login.to_string(),
            kind: "Organization".to_string(),
        },
        stargazers_count: 1,
        created_at: "2026-10-18T00:00:00Z".to_string(),
    }
}

/// Records named `{prefix}-{i}` for every `i` in `range`.
pub fn records(prefix: &str, range: Range<usize>, language: Option<&str>) -> Vec<RepositoryRecord> {
    range
        .map(|i| record(&format!("{prefix}-{i}"), language, None))
        .collect()
}

pub fn test_config() -> Config {
    serde_yaml::from_str(
        r#"
upstream:
    token: ghp_test
login:
    username: admin
    password: secret
jwt:
    signing_key: test-signing-key
"#,
    )
    .unwrap()
}

type Script =
    Box<dyn Fn(usize, &PageQuery) -> Result<Vec<RepositoryRecord>, UpstreamError> + Send + Sync>;

/// A `RepositorySource` answering from a script and recording every query.
pub struct ScriptedSource {
    script: Script,
    calls: Mutex<Vec<PageQuery>>,
}

impl ScriptedSource {
    /// The script gets the zero based call number and the query.
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(usize, &PageQuery) -> Result<Vec<RepositoryRecord>, UpstreamError>
            + Send
            + Sync
            + 'static,
    {
        ScriptedSource {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns the pages in order, then empty pages.
    pub fn with_pages(pages: Vec<Vec<RepositoryRecord>>) -> Self {
        Self::new(move |call, _| Ok(pages.get(call).cloned().unwrap_or_default()))
    }

    pub fn calls(&self) -> Vec<PageQuery> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositorySource for ScriptedSource {
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<RepositoryRecord>, UpstreamError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(query.clone());
            calls.len() - 1
        };
        (self.script)(call, query)
    }
}

#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Default)]
struct UpstreamState {
    org_pages: HashMap<(String, u32), Vec<RepositoryRecord>>,
    search_pages: VecDeque<Vec<RepositoryRecord>>,
    reject: Option<StatusCode>,
    garbage: bool,
    delay: Option<Duration>,
    requests: Vec<SeenRequest>,
}

type SharedState = Arc<Mutex<UpstreamState>>;

/// A fake of the GitHub API served over a real socket on an ephemeral port.
pub struct TestUpstream {
    addr: SocketAddr,
    state: SharedState,
    handle: JoinHandle<()>,
}

impl TestUpstream {
    pub async fn spawn() -> Self {
        let state = SharedState::default();
        let app = Router::new().fallback(serve).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestUpstream {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    pub fn set_org_page(&self, org: &str, page: u32, records: Vec<RepositoryRecord>) {
        self.state
            .lock()
            .unwrap()
            .org_pages
            .insert((org.to_string(), page), records);
    }

    pub fn push_search_page(&self, records: Vec<RepositoryRecord>) {
        self.state.lock().unwrap().search_pages.push_back(records);
    }

    pub fn reject_with(&self, status: StatusCode) {
        self.state.lock().unwrap().reject = Some(status);
    }

    pub fn respond_with_garbage(&self) {
        self.state.lock().unwrap().garbage = true;
    }

    pub fn delay_responses(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Stops the server and closes the listening socket.
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn serve(State(state): State<SharedState>, uri: Uri, headers: HeaderMap) -> Response {
    let query = uri.query().unwrap_or_default().to_string();
    let page = url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse::<u32>().ok())
        .unwrap_or(1);

    let (delay, response) = {
        let mut state = state.lock().unwrap();
        state.requests.push(SeenRequest {
            path: uri.path().to_string(),
            query: query.clone(),
            authorization: header_value(&headers, header::AUTHORIZATION),
            accept: header_value(&headers, header::ACCEPT),
            user_agent: header_value(&headers, header::USER_AGENT),
        });

        let response = if let Some(status) = state.reject {
            (status, r#"{"message": "rejected"}"#).into_response()
        } else if state.garbage {
            (StatusCode::OK, "<html>not json</html>").into_response()
        } else if let Some(org) = uri
            .path()
            .strip_prefix("/orgs/")
            .and_then(|rest| rest.strip_suffix("/repos"))
        {
            let items = state
                .org_pages
                .get(&(org.to_string(), page))
                .cloned()
                .unwrap_or_default();
            axum::Json(items).into_response()
        } else if uri.path() == "/search/repositories" {
            let items = state.search_pages.pop_front().unwrap_or_default();
            axum::Json(serde_json::json!({
                "total_count": items.len(),
                "incomplete_results": false,
                "items": items,
            }))
            .into_response()
        } else {
            StatusCode::NOT_FOUND.into_response()
        };

        (state.delay, response)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    response
}
