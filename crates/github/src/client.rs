//! Shared client state and the authorized send path

use std::future::Future;
use std::sync::Arc;

use cache::ConditionalCache;
use common::MetricsSink;
use common::metrics::RATE_LIMIT_HITS;
use reqwest::header::{AUTHORIZATION, ETAG, LINK};
use reqwest::{RequestBuilder, Response, StatusCode};
use token_pool::{Pool, Token};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::pagination::parse_last_page;

/// Tunables for talking to GitHub.
#[derive(Debug, Clone)]
pub struct Config {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// `per_page` for stargazer requests.
    pub page_size: u32,
    /// Page count above which collection switches to sampling.
    pub max_sample_pages: u32,
    /// Minimum remaining quota, in percent, for a token to be used.
    pub rate_limit_floor_pct: u8,
    /// Ceiling on simultaneous page requests within one collection.
    pub max_concurrent_requests: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            page_size: 100,
            max_sample_pages: 15,
            rate_limit_floor_pct: 80,
            max_concurrent_requests: 5,
        }
    }
}

/// GitHub API client.
///
/// Cheap to clone; clones share the token pool, the cache and the HTTP
/// connection pool.
#[derive(Clone)]
pub struct GitHub {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) http: reqwest::Client,
    pub(crate) pool: Arc<Pool>,
    pub(crate) cache: ConditionalCache,
    pub(crate) metrics: Arc<dyn MetricsSink>,
    pub(crate) config: Config,
}

/// A classified 200 or 304 answer. Every other status becomes an `Error`.
pub(crate) enum Fetched {
    NotModified,
    Fresh {
        body: Vec<u8>,
        etag: Option<String>,
        last_page: Option<u32>,
    },
}

impl GitHub {
    pub fn new(
        http: reqwest::Client,
        pool: Arc<Pool>,
        cache: ConditionalCache,
        metrics: Arc<dyn MetricsSink>,
        mut config: Config,
    ) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(Inner {
                http,
                pool,
                cache,
                metrics,
                config,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The token pool shared by every request of this client.
    pub fn pool(&self) -> &Arc<Pool> {
        &self.inner.pool
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.config.base_url, path)
    }

    /// Find a token whose quota is above the floor.
    ///
    /// Probes each token at most once. Tokens failing the probe are skipped
    /// (and invalidated by the probe on 401); once the rotation comes back
    /// to a token already probed, the pool is exhausted for this request.
    async fn authorize(&self) -> Result<&Token> {
        let mut probed: Vec<&Token> = Vec::new();
        for _ in 0..self.inner.pool.len() {
            let Some(token) = self.inner.pool.pick() else {
                break;
            };
            if probed.iter().any(|seen| std::ptr::eq(*seen, token)) {
                break;
            }
            probed.push(token);
            match self.check(token).await {
                Ok(()) => return Ok(token),
                Err(e) => {
                    debug!(token = %token, error = %e, "token failed quota probe, trying next")
                }
            }
        }
        Err(Error::CredentialExhausted)
    }

    /// Send `request`, authenticated when a usable token exists, and
    /// classify the answer.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Fetched> {
        let token = match self.authorize().await {
            Ok(token) => Some(token),
            Err(Error::CredentialExhausted) => {
                debug!("no usable token, sending unauthenticated");
                None
            }
            Err(e) => return Err(e),
        };

        let request = match token {
            Some(token) => request.header(AUTHORIZATION, authorization(token)),
            None => request,
        };

        let response = request.send().await?;
        self.classify(response, token).await
    }

    async fn classify(&self, response: Response, token: Option<&Token>) -> Result<Fetched> {
        let status = response.status();
        match status {
            StatusCode::NOT_MODIFIED => Ok(Fetched::NotModified),
            StatusCode::FORBIDDEN => {
                self.inner.metrics.increment(RATE_LIMIT_HITS);
                warn!("rate limit hit");
                Err(Error::RateLimited)
            }
            StatusCode::NOT_FOUND => Err(Error::NotFound),
            StatusCode::UNAUTHORIZED => {
                if let Some(token) = token {
                    self.inner.pool.invalidate(token);
                }
                Err(Error::UpstreamApi(upstream_message(status, response).await))
            }
            StatusCode::OK => {
                let etag = header_str(&response, ETAG.as_str()).map(str::to_string);
                let last_page = header_str(&response, LINK.as_str()).and_then(parse_last_page);
                let body = response.bytes().await?.to_vec();
                Ok(Fetched::Fresh {
                    body,
                    etag,
                    last_page,
                })
            }
            _ => Err(Error::UpstreamApi(upstream_message(status, response).await)),
        }
    }
}

/// `Authorization` header value for `token`.
pub(crate) fn authorization(token: &Token) -> String {
    format!("token {}", token.key())
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

async fn upstream_message(status: StatusCode, response: Response) -> String {
    let body = response
        .bytes()
        .await
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();
    format!("{}: {}", status.as_u16(), body)
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
