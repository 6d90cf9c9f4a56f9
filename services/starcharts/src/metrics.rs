//! Prometheus metrics exposition
//!
//! Service-level metrics:
//!
//! - `starcharts_http_requests_total` (counter): labels `status`, `method`
//! - `starcharts_http_request_duration_seconds` (histogram): label `status`
//!
//! GitHub client metrics reach the same recorder through [`PrometheusSink`].

use common::MetricsSink;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

const REQUEST_DURATION: &str = "starcharts_http_request_duration_seconds";

/// Bucket boundaries from 5ms to 60s. Sampled collections of large
/// repositories sit at the upper end.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        metrics_exporter_prometheus::Matcher::Full(REQUEST_DURATION.to_string()),
        DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed request with status code and HTTP method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "starcharts_http_requests_total",
        "status" => status_str.clone(),
        "method" => method.to_string()
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION, "status" => status_str).record(duration_secs);
}

/// `MetricsSink` backed by the `metrics` facade.
pub struct PrometheusSink;

impl MetricsSink for PrometheusSink {
    fn increment(&self, name: &'static str) {
        metrics::counter!(name).increment(1);
    }

    fn gauge(&self, name: &'static str, value: f64) {
        metrics::gauge!(name).set(value);
    }
}
