//! GitHub stargazer history client
//!
//! Resolves repository metadata and collects star events from the GitHub REST
//! API while sharing a pool of tokens across all in-flight requests. Every
//! outbound request goes through the same attempt chain:
//!
//! ```text
//! pick token → quota probe → (rejected: next token, at most pool-size times)
//!            → send → classify → replay | store | rate limited | not found | upstream error
//! ```
//!
//! When no token survives the probe the request goes out unauthenticated.
//! Conditional requests use ETags kept next to the cached bodies, see
//! [`cache::ConditionalCache`].
//!
//! Large repositories are sampled: beyond `max_sample_pages` pages only an
//! evenly spaced subset of pages is fetched and each contributes one point.

mod client;
mod conditional;
pub mod error;
mod gate;
pub mod pagination;
mod repo;
mod stars;
mod types;

pub use client::{Config, GitHub};
pub use error::{Error, Result};
pub use pagination::PagePlan;
pub use types::{Repository, StarEvent};
