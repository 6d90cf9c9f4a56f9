//! ETag-conditional GET on top of the authorized send path

use reqwest::header::{ACCEPT, IF_NONE_MATCH};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::client::{Fetched, GitHub};
use crate::error::{Error, Result};

impl GitHub {
    /// GET `url` conditionally, caching the decoded body under `key`.
    ///
    /// A 304 replays the cached body. If the body is gone the dangling ETag
    /// is dropped and the request is re-sent once without a precondition.
    /// `accept` overrides the `Accept` header.
    pub(crate) async fn get_conditional<T>(
        &self,
        key: &str,
        url: &str,
        accept: Option<&str>,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let cache = &self.inner.cache;
        let etag = cache.etag(key).await;

        match self.send(self.request(url, accept, etag.as_deref())).await? {
            Fetched::NotModified => {
                if let Some(value) = cache.replay(key).await {
                    return Ok(value);
                }
            }
            Fetched::Fresh { body, etag, .. } => return self.keep(key, &body, etag).await,
        }

        debug!(key, "re-fetching without etag");
        match self.send(self.request(url, accept, None)).await? {
            Fetched::Fresh { body, etag, .. } => self.keep(key, &body, etag).await,
            Fetched::NotModified => {
                warn!(key, "not modified without a precondition");
                Err(Error::UpstreamApi("304 answer to an unconditional request".to_string()))
            }
        }
    }

    pub(crate) fn request(
        &self,
        url: &str,
        accept: Option<&str>,
        etag: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut request = self.inner.http.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        request
    }

    async fn keep<T>(&self, key: &str, body: &[u8], etag: Option<String>) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let value: T = serde_json::from_slice(body)?;
        self.inner.cache.store(key, &value, etag.as_deref()).await;
        Ok(value)
    }
}
