//! In-process GitHub API stand-in for client tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use cache::{ConditionalCache, MemoryStore};
use common::CountingSink;
use github::{Config, GitHub};
use token_pool::Pool;
use tokio::net::TcpListener;

/// One request the mock received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub page: Option<u32>,
    pub authorization: Option<String>,
    pub if_none_match: Option<String>,
    pub accept: Option<String>,
}

/// How the mock answers. Tweak between calls with `MockServer::set`.
#[derive(Debug, Clone)]
pub struct Behavior {
    pub repo_status: u16,
    pub stargazers_count: u64,
    pub repo_etag: Option<String>,
    /// Answer every repository request with 304, preconditions or not.
    pub repo_always_not_modified: bool,
    pub rate_status: u16,
    pub remaining: u64,
    pub limit: u64,
    /// Tokens whose quota probe answers 401.
    pub revoked_tokens: HashSet<String>,
    /// Drives the `Link` header of stargazer pages.
    pub last_page: Option<u32>,
    pub stars_per_page: usize,
    pub empty_pages: HashSet<u32>,
    pub page_status: HashMap<u32, u16>,
    pub page_delay: Option<Duration>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            repo_status: 200,
            stargazers_count: 2,
            repo_etag: Some("\"repo-v1\"".to_string()),
            repo_always_not_modified: false,
            rate_status: 200,
            remaining: 5000,
            limit: 5000,
            revoked_tokens: HashSet::new(),
            last_page: None,
            stars_per_page: 2,
            empty_pages: HashSet::new(),
            page_status: HashMap::new(),
            page_delay: None,
        }
    }
}

struct MockState {
    behavior: Mutex<Behavior>,
    requests: Mutex<Vec<Recorded>>,
    base_url: String,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub struct MockServer {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let state = Arc::new(MockState {
            behavior: Mutex::new(behavior),
            requests: Mutex::new(Vec::new()),
            base_url: base_url.clone(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/rate_limit", get(rate_limit))
            .route("/repos/{owner}/{repo}", get(repository))
            .route("/repos/{owner}/{repo}/stargazers", get(stargazers))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, state }
    }

    pub fn set(&self, f: impl FnOnce(&mut Behavior)) {
        f(&mut self.state.behavior.lock().unwrap());
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Requests other than quota probes.
    pub fn api_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path != "/rate_limit")
            .collect()
    }

    pub fn probes(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == "/rate_limit")
            .collect()
    }

    /// Stargazer pages requested, sorted.
    pub fn pages_requested(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self
            .api_requests()
            .iter()
            .filter(|r| r.path.ends_with("/stargazers"))
            .filter_map(|r| r.page)
            .collect();
        pages.sort_unstable();
        pages
    }

    /// Highest number of stargazer requests served at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn clear_requests(&self) {
        self.state.requests.lock().unwrap().clear();
    }
}

/// Client wired to `server` with an in-memory cache and counting metrics.
pub struct Harness {
    pub github: GitHub,
    pub store: Arc<MemoryStore>,
    pub metrics: Arc<CountingSink>,
}

pub fn harness(
    server: &MockServer,
    tokens: &[&str],
    configure: impl FnOnce(&mut Config),
) -> Harness {
    let metrics = Arc::new(CountingSink::new());
    let store = Arc::new(MemoryStore::new());
    let pool = Arc::new(Pool::new(
        tokens.iter().map(|t| t.to_string()).collect(),
        metrics.clone(),
    ));
    let cache = ConditionalCache::new(store.clone(), metrics.clone());

    let mut config = Config {
        base_url: server.base_url.clone(),
        ..Config::default()
    };
    configure(&mut config);

    let github = GitHub::new(reqwest::Client::new(), pool, cache, metrics.clone(), config);
    Harness {
        github,
        store,
        metrics,
    }
}

/// `starred_at` of star `index` on `page`. Later pages hold later stars,
/// within a page stars are served newest first.
pub fn starred_at(page: u32, index: usize, per_page: usize) -> String {
    let minutes = u64::from(page) * 1000 + (per_page - index) as u64;
    let base = chrono::DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z").unwrap();
    (base + chrono::Duration::minutes(minutes as i64)).to_rfc3339()
}

fn record(state: &MockState, path: &str, page: Option<u32>, headers: &HeaderMap) {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.requests.lock().unwrap().push(Recorded {
        path: path.to_string(),
        page,
        authorization: value(header::AUTHORIZATION),
        if_none_match: value(header::IF_NONE_MATCH),
        accept: value(header::ACCEPT),
    });
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap()
}

async fn rate_limit(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    record(&state, "/rate_limit", None, &headers);
    let behavior = state.behavior.lock().unwrap().clone();

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("token "))
        .unwrap_or_default();
    if behavior.revoked_tokens.contains(token) {
        return (StatusCode::UNAUTHORIZED, r#"{"message":"Bad credentials"}"#).into_response();
    }

    let body = serde_json::json!({
        "rate": {"remaining": behavior.remaining, "limit": behavior.limit, "reset": 0, "used": 0}
    });
    (status(behavior.rate_status), axum::Json(body)).into_response()
}

async fn repository(
    State(state): State<Arc<MockState>>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/repos/{owner}/{repo}");
    record(&state, &path, None, &headers);
    let behavior = state.behavior.lock().unwrap().clone();

    if behavior.repo_status != 200 {
        let body = format!(r#"{{"message":"mock status {}"}}"#, behavior.repo_status);
        return (status(behavior.repo_status), body).into_response();
    }

    if behavior.repo_always_not_modified {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    let if_none_match = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok());
    if let (Some(sent), Some(current)) = (if_none_match, behavior.repo_etag.as_deref())
        && sent == current
    {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    let body = serde_json::json!({
        "full_name": format!("{owner}/{repo}"),
        "stargazers_count": behavior.stargazers_count,
        "created_at": "2019-06-01T12:00:00Z",
    });
    let mut response = axum::Json(body).into_response();
    if let Some(etag) = behavior.repo_etag {
        response
            .headers_mut()
            .insert(header::ETAG, etag.parse().unwrap());
    }
    response
}

async fn stargazers(
    State(state): State<Arc<MockState>>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/repos/{owner}/{repo}/stargazers");
    let page: u32 = query
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    record(&state, &path, Some(page), &headers);
    let behavior = state.behavior.lock().unwrap().clone();

    if let Some(delay) = behavior.page_delay {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    if let Some(&code) = behavior.page_status.get(&page) {
        let body = format!(r#"{{"message":"mock status {code}"}}"#);
        return (status(code), body).into_response();
    }

    let etag = format!("\"page-{page}\"");
    let if_none_match = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok());
    if if_none_match == Some(etag.as_str()) {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    let stars: Vec<serde_json::Value> = if behavior.empty_pages.contains(&page) {
        Vec::new()
    } else {
        (0..behavior.stars_per_page)
            .map(|i| {
                serde_json::json!({
                    "starred_at": starred_at(page, i, behavior.stars_per_page),
                    "user": {"login": format!("user-{page}-{i}")},
                })
            })
            .collect()
    };

    let mut response = axum::Json(stars).into_response();
    response
        .headers_mut()
        .insert(header::ETAG, etag.parse().unwrap());
    if let Some(last) = behavior.last_page {
        let next = page + 1;
        let link = format!(
            r#"<{base}{path}?per_page=100&page={next}>; rel="next", <{base}{path}?per_page=100&page={last}>; rel="last""#,
            base = state.base_url,
        );
        response
            .headers_mut()
            .insert(header::LINK, link.parse().unwrap());
    }
    response
}
