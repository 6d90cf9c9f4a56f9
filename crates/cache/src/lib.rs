//! Key/value cache with ETag-aware helpers
//!
//! Defines the `Store` trait that abstracts the backing key/value store
//! (get/put/delete by string key, no TTL) and `ConditionalCache`, which layers
//! the conditional-request conventions on top of it:
//! - a body lives under `key`, its ETag under `key + "_etag"`
//! - an ETag may outlive its body; that case reads as a miss, never an error
//! - read failures of any kind (miss, backend error, undecodable bytes) fall
//!   through to a live fetch and are only logged
//!
//! `MemoryStore` is the in-process implementation used by the service and tests.

pub mod conditional;
pub mod memory;

pub use conditional::{ConditionalCache, etag_key};
pub use memory::MemoryStore;

use std::future::Future;
use std::pin::Pin;

/// Errors from backing store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Result alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed future returned by `Store` methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Abstraction over the backing key/value store.
///
/// Implementations must be safe for concurrent use; callers add no locking of
/// their own. Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Store>`).
pub trait Store: Send + Sync {
    /// Identifier for logging (e.g. "memory").
    fn id(&self) -> &str;

    /// Fetch the raw bytes stored under `key`, `None` on miss.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> StoreFuture<'a, ()>;

    /// Remove `key`. Deleting a missing key is not an error.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}
