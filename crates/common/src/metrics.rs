//! Metrics sink capability
//!
//! Components that report counters (credential invalidations, ETag hits,
//! rate-limit hits) take an `Arc<dyn MetricsSink>` at construction. The
//! service wires in a Prometheus-backed sink; libraries and tests use
//! `NoopSink` or `CountingSink`.

use std::collections::HashMap;
use std::sync::Mutex;

/// Upstream answered 403 to a resource or page request.
pub const RATE_LIMIT_HITS: &str = "github_rate_limit_hits_total";
/// A 304 answer was served from the cached body.
pub const EFFECTIVE_ETAGS: &str = "github_effective_etags_total";
/// A 304 answer arrived but the cached body was gone.
pub const DANGLING_ETAGS: &str = "github_dangling_etags_total";
/// A credential was marked permanently invalid.
pub const INVALIDATED_TOKENS: &str = "github_invalidated_tokens_total";
/// Number of credentials configured in the pool.
pub const TOKENS_POOL_SIZE: &str = "github_tokens_pool_size";
/// A star collection ran in sampling mode.
pub const SAMPLED_COLLECTIONS: &str = "github_sampled_collections_total";

/// Write-only sink for named counters and gauges.
pub trait MetricsSink: Send + Sync {
    /// Add one to the counter `name`.
    fn increment(&self, name: &'static str);

    /// Set the gauge `name` to `value`.
    fn gauge(&self, name: &'static str, value: f64);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn increment(&self, _name: &'static str) {}

    fn gauge(&self, _name: &'static str, _value: f64) {}
}

/// In-memory sink that remembers every value it receives.
///
/// Handy for assertions in tests.
#[derive(Debug, Default)]
pub struct CountingSink {
    counters: Mutex<HashMap<&'static str, u64>>,
    gauges: Mutex<HashMap<&'static str, f64>>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter (0 if never incremented).
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Last value written to a gauge, if any.
    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        self.gauges
            .lock()
            .ok()
            .and_then(|g| g.get(name).copied())
    }
}

impl MetricsSink for CountingSink {
    fn increment(&self, name: &'static str) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(name).or_insert(0) += 1;
        }
    }

    fn gauge(&self, name: &'static str, value: f64) {
        if let Ok(mut gauges) = self.gauges.lock() {
            gauges.insert(name, value);
        }
    }
}
