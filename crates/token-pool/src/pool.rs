//! Round-robin token selection with lazy invalidation
//!
//! The pool is a fixed-size list of tokens plus a rotation cursor. The cursor
//! advances on every pick whether or not the token under it is still valid,
//! so concurrent callers spread across the pool. Validity only ever goes from
//! true to false.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use common::metrics::{INVALIDATED_TOKENS, TOKENS_POOL_SIZE};
use common::{MetricsSink, Secret};
use tracing::{debug, info, warn};

/// A single API token and its validity flag.
///
/// Displays as `...xyz` (last three characters) so it can be logged.
pub struct Token {
    key: Secret<String>,
    valid: AtomicBool,
}

impl Token {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Secret::new(key.into()),
            valid: AtomicBool::new(true),
        }
    }

    /// The raw token, for the Authorization header only.
    pub fn key(&self) -> &str {
        self.key.expose()
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Mark the token invalid. Returns true if this call flipped it.
    fn invalidate(&self) -> bool {
        self.valid.swap(false, Ordering::AcqRel)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "...{}", self.key.hint(3))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("key", &format_args!("{self}"))
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Fixed-size token pool.
///
/// Uses an `AtomicUsize` for the rotation cursor and an `AtomicBool` per
/// token, so `pick` and `invalidate` are safe to call from any number of
/// in-flight requests without external locking.
pub struct Pool {
    tokens: Vec<Token>,
    next_index: AtomicUsize,
    metrics: Arc<dyn MetricsSink>,
}

impl Pool {
    /// Build a pool from raw token strings. Order is preserved.
    pub fn new(keys: Vec<String>, metrics: Arc<dyn MetricsSink>) -> Self {
        let tokens: Vec<Token> = keys.into_iter().map(Token::new).collect();
        metrics.gauge(TOKENS_POOL_SIZE, tokens.len() as f64);
        info!(tokens = tokens.len(), "token pool initialized");
        Self {
            tokens,
            next_index: AtomicUsize::new(0),
            metrics,
        }
    }

    /// Number of tokens, valid or not.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens still valid.
    pub fn valid_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_valid()).count()
    }

    /// Pick the next valid token, round-robin.
    ///
    /// Each attempt takes the token under the cursor and advances the cursor,
    /// valid or not. After one attempt per pool slot without finding a valid
    /// token, returns `None`. An empty pool always returns `None`.
    pub fn pick(&self) -> Option<&Token> {
        let n = self.tokens.len();
        if n == 0 {
            return None;
        }

        for _ in 0..n {
            let idx = self.next_index.fetch_add(1, Ordering::Relaxed) % n;
            let token = &self.tokens[idx];
            if token.is_valid() {
                debug!(token = %token, "picked token");
                return Some(token);
            }
        }

        warn!(tokens = n, "no valid tokens left in pool");
        None
    }

    /// Permanently invalidate `token`. Repeated calls are no-ops.
    pub fn invalidate(&self, token: &Token) {
        if token.invalidate() {
            self.metrics.increment(INVALIDATED_TOKENS);
            warn!(token = %token, remaining = self.valid_count(), "invalidated token");
        }
    }

    /// Pool health summary for the health endpoint.
    ///
    /// Status mapping: all valid → healthy, some valid → degraded,
    /// none valid (or empty pool) → unhealthy.
    pub fn health(&self) -> serde_json::Value {
        let total = self.tokens.len();
        let valid = self.valid_count();
        let status = if valid == total && total > 0 {
            "healthy"
        } else if valid > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        serde_json::json!({
            "status": status,
            "tokens_total": total,
            "tokens_valid": valid,
            "tokens_invalid": total - valid,
        })
    }
}
