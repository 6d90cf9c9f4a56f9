//! Credential pool for GitHub API tokens
//!
//! Holds a fixed set of API tokens and hands one out per request attempt,
//! round-robin. Tokens the remote API rejects are invalidated permanently and
//! skipped from then on. An empty pool is valid: it never yields a token and
//! callers fall back to unauthenticated requests.
//!
//! Token lifecycle:
//! 1. Loaded at startup from configuration → valid
//! 2. Picked round-robin for each outbound request attempt
//! 3. Quota probe answers 401 (or a resource request does) → invalid, forever
//!
//! The `quota` module classifies quota probe answers and decides whether the
//! remaining quota of a token is still above the configured floor.

pub mod pool;
pub mod quota;

pub use pool::{Pool, Token};
pub use quota::{ProbeOutcome, RateLimitResponse, RateStatus, classify_probe};
