//! Pre-flight quota probe run before every authenticated request

use reqwest::header::AUTHORIZATION;
use token_pool::{ProbeOutcome, RateLimitResponse, Token, classify_probe};
use tracing::{debug, warn};

use crate::client::{GitHub, authorization};
use crate::error::{Error, Result};

impl GitHub {
    /// Ask GitHub how much quota `token` has left.
    ///
    /// A 401 invalidates the token. Any other non-2xx answer, or a remaining
    /// quota below the configured floor, rejects the token for this attempt
    /// only.
    pub(crate) async fn check(&self, token: &Token) -> Result<()> {
        let response = self
            .inner
            .http
            .get(self.url("/rate_limit"))
            .header(AUTHORIZATION, authorization(token))
            .send()
            .await?;

        let status = response.status().as_u16();
        match classify_probe(status) {
            ProbeOutcome::InvalidCredential => {
                self.inner.pool.invalidate(token);
                Err(Error::InvalidCredential)
            }
            ProbeOutcome::Rejected => {
                let body = response.bytes().await?;
                Err(Error::UpstreamApi(format!(
                    "{status}: {}",
                    String::from_utf8_lossy(&body)
                )))
            }
            ProbeOutcome::Accepted => {
                let body = response.bytes().await?;
                let RateLimitResponse { rate } = serde_json::from_slice(&body)?;
                let floor = self.inner.config.rate_limit_floor_pct;
                if rate.is_below_floor(floor) {
                    warn!(
                        token = %token,
                        remaining = rate.remaining,
                        limit = rate.limit,
                        floor_pct = floor,
                        "token quota below floor"
                    );
                    return Err(Error::RateLimited);
                }
                debug!(
                    token = %token,
                    remaining = rate.remaining,
                    limit = rate.limit,
                    "token quota ok"
                );
                Ok(())
            }
        }
    }
}
