//! Error types for GitHub API operations

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 403 from GitHub, or a token's quota is below the configured floor.
    #[error("rate limited by GitHub")]
    RateLimited,

    #[error("repository not found")]
    NotFound,

    /// Unexpected status from GitHub. Carries the raw body for diagnostics.
    #[error("GitHub API error: {0}")]
    UpstreamApi(String),

    /// No token in the pool passed the quota probe.
    #[error("no usable token left")]
    CredentialExhausted,

    /// The quota probe answered 401 and the token was invalidated.
    #[error("token rejected by GitHub")]
    InvalidCredential,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("the request was cancelled")]
    Cancelled,

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result alias for GitHub operations.
pub type Result<T> = std::result::Result<T, Error>;
