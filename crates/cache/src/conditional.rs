//! Conditional-request helpers over a backing `Store`
//!
//! Callers doing an ETag-conditional GET follow one protocol:
//! 1. `etag(key)` and, if present, send it as `If-None-Match`
//! 2. on 304, `replay(key)`; a `None` means the body was evicted, the dangling
//!    ETag has already been removed, and the caller re-sends unconditionally once
//! 3. on a fresh 200, `store(key, &value, etag)`
//!
//! Values are encoded as JSON. Nothing here returns an error: cache trouble
//! is logged and reported as a miss so the caller falls through to a live fetch.

use std::sync::Arc;

use common::MetricsSink;
use common::metrics::{DANGLING_ETAGS, EFFECTIVE_ETAGS};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::Store;

/// Key of the ETag sibling entry for `key`.
pub fn etag_key(key: &str) -> String {
    format!("{key}_etag")
}

/// ETag-aware view over a shared backing store.
#[derive(Clone)]
pub struct ConditionalCache {
    store: Arc<dyn Store>,
    metrics: Arc<dyn MetricsSink>,
}

impl ConditionalCache {
    pub fn new(store: Arc<dyn Store>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { store, metrics }
    }

    /// Decode the value under `key`. Misses, backend failures and undecodable
    /// bytes all return `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, store = self.store.id(), error = %e, "failed to read from cache");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Encode and store `value` under `key`. Failures are logged only.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.store.put(key, bytes).await {
            warn!(key, store = self.store.id(), error = %e, "failed to cache");
        }
    }

    /// Remove `key`. Failures are logged only.
    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, store = self.store.id(), error = %e, "failed to delete from cache");
        }
    }

    /// The ETag recorded for `key`, if any.
    pub async fn etag(&self, key: &str) -> Option<String> {
        self.get(&etag_key(key)).await
    }

    /// Serve a 304 answer from the cached body under `key`.
    ///
    /// When the body is gone the ETag sibling is deleted before returning
    /// `None`, so the caller's retry goes out without a precondition.
    pub async fn replay<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get(key).await {
            Some(value) => {
                self.metrics.increment(EFFECTIVE_ETAGS);
                debug!(key, "not modified, served from cache");
                Some(value)
            }
            None => {
                self.metrics.increment(DANGLING_ETAGS);
                warn!(key, "not modified but body is no longer cached, dropping etag");
                self.delete(&etag_key(key)).await;
                None
            }
        }
    }

    /// Record a fresh body and, when the server sent one, its ETag.
    pub async fn store<T: Serialize>(&self, key: &str, value: &T, etag: Option<&str>) {
        self.put(key, value).await;
        if let Some(etag) = etag {
            self.put(&etag_key(key), &etag).await;
        }
    }
}
