use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::client::{GitHub, cancellable};
use crate::error::Result;
use crate::types::Repository;

/// Cache key of a repository body.
pub(crate) fn repo_key(full_name: &str) -> String {
    format!("repo:{full_name}")
}

impl GitHub {
    /// Resolve `owner/name` to its metadata.
    ///
    /// Conditional on the cached ETag, so an unchanged repository costs a 304.
    #[instrument(skip_all, fields(repo = %name))]
    pub async fn resolve(&self, name: &str, cancel: &CancellationToken) -> Result<Repository> {
        let url = self.url(&format!("/repos/{name}"));
        let repo: Repository =
            cancellable(cancel, self.get_conditional(&repo_key(name), &url, None)).await?;
        info!(stars = repo.stargazers_count, "resolved repository");
        Ok(repo)
    }
}
