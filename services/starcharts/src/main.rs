//! starcharts
//!
//! Single-binary Rust service that:
//! 1. Resolves GitHub repositories and their star history
//! 2. Shares a pool of GitHub tokens across all in-flight requests
//! 3. Serves the history as a plottable JSON series
//! 4. Exposes health and Prometheus metrics

mod config;
mod error;
mod metrics;
mod routes;
mod series;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use cache::{ConditionalCache, MemoryStore};
use common::MetricsSink;
use github::GitHub;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};
use token_pool::Pool;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::metrics::PrometheusSink;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Identifies this service to GitHub.
const USER_AGENT: &str = concat!("starcharts/", env!("CARGO_PKG_VERSION"));

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    github: GitHub,
    prometheus: PrometheusHandle,
    /// Parent of every per-request cancellation token.
    shutdown: CancellationToken,
    started_at: Instant,
}

/// Build the axum router with all routes and shared state.
///
/// `max_connections` caps the number of requests processed at once.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/{owner}/{repo}", get(routes::repository))
        .route("/{owner}/{repo}/stars", get(routes::stars))
        .layer(middleware::from_fn(track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, filter from LOG_LEVEL, then RUST_LOG, then info
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting starcharts");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        base_url = %config.github.base_url,
        tokens = config.github.tokens.len(),
        max_sample_pages = config.github.max_sample_pages,
        "configuration loaded"
    );

    let sink: Arc<dyn MetricsSink> = Arc::new(PrometheusSink);
    let pool = Arc::new(Pool::new(config.github.token_keys(), sink.clone()));
    let cache = ConditionalCache::new(Arc::new(MemoryStore::new()), sink.clone());
    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.github.timeout())
        .build()
        .context("failed to build HTTP client")?;
    let github = GitHub::new(http, pool, cache, sink, config.github.client_config());

    let shutdown = CancellationToken::new();
    let app_state = AppState {
        github,
        prometheus: prometheus_handle,
        shutdown: shutdown.clone(),
        started_at: Instant::now(),
    };

    let listen_addr = config.server.listen_addr;
    let app = build_router(app_state, config.server.max_connections);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // Graceful shutdown:
    // 1. shutdown_signal() fires on SIGTERM/SIGINT
    // 2. cancelling `shutdown` stops new connections and aborts in-flight
    //    GitHub work through the per-request child tokens
    // 3. DRAIN_TIMEOUT bounds how long the remaining responses may take
    let drain = shutdown.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(drain.cancelled_owned())
            .await
    });

    shutdown_signal().await;
    shutdown.cancel();

    // The drain timer starts at signal receipt
    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Record status, method and latency of every request.
async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    metrics::record_request(
        response.status().as_u16(),
        &method,
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Health endpoint: uptime plus token pool state.
///
/// Always 200. An exhausted pool degrades to unauthenticated requests, it
/// does not take the service down.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.github.pool().health();
    let status = if pool["status"] == "unhealthy" && !state.github.pool().is_empty() {
        "degraded"
    } else {
        "healthy"
    };

    let body = serde_json::json!({
        "status": status,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "tokens": pool,
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
