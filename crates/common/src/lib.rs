//! Shared building blocks for the starcharts workspace
//!
//! Holds the pieces every other crate leans on: the redacting `Secret`
//! wrapper used for API tokens, the configuration error type, and the
//! `MetricsSink` capability that components receive instead of reaching for
//! process-global counters.

mod error;
pub mod metrics;
mod secret;

pub use error::{Error, Result};
pub use metrics::{CountingSink, MetricsSink, NoopSink};
pub use secret::Secret;
