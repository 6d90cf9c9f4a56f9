//! Star history collection: first page, plan, bounded fan-out, merge

use std::sync::Arc;

use chrono::Utc;
use common::metrics::SAMPLED_COLLECTIONS;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::client::{Fetched, GitHub, cancellable};
use crate::error::{Error, Result};
use crate::pagination::PagePlan;
use crate::types::{Repository, StarEvent};

/// Media type that makes GitHub include `starred_at` in stargazer pages.
const STAR_MEDIA_TYPE: &str = "application/vnd.github.v3.star+json";

/// Cache key of one stargazer page body.
pub(crate) fn page_key(full_name: &str, page: u32) -> String {
    format!("stars:{full_name}:{page}")
}

impl GitHub {
    /// Collect the star history of `repo`.
    ///
    /// Repositories spanning at most `max_sample_pages` pages are fetched in
    /// full and returned ordered by `starred_at`. Larger ones are sampled:
    /// one event per sampled page, tagged with its true ordinal and ordered
    /// by page, followed by a point at "now" carrying the total star count.
    ///
    /// Any hard failure of a page aborts the collection. Cancelling `cancel`
    /// aborts every in-flight page request.
    #[instrument(skip_all, fields(repo = %repo.full_name))]
    pub async fn collect(
        &self,
        repo: &Repository,
        cancel: &CancellationToken,
    ) -> Result<Vec<StarEvent>> {
        cancellable(cancel, self.collect_stars(repo)).await
    }

    async fn collect_stars(&self, repo: &Repository) -> Result<Vec<StarEvent>> {
        let (first, last_page) = self.first_page(&repo.full_name).await?;
        let plan = PagePlan::new(last_page, self.inner.config.max_sample_pages);
        debug!(
            last_page,
            stars = repo.stargazers_count,
            sampled = plan.is_sampled(),
            "planned pages"
        );

        match plan {
            PagePlan::Exhaustive(pages) => {
                let mut stars = first;
                for (_, page) in self.fetch_pages(&repo.full_name, &pages).await? {
                    stars.extend(page);
                }
                stars.sort_by_key(|star| star.starred_at);
                Ok(stars)
            }
            PagePlan::Sampled(pages) => {
                self.inner.metrics.increment(SAMPLED_COLLECTIONS);
                info!(last_page, samples = pages.len(), "sampling large repository");

                let rest: Vec<u32> = pages.into_iter().filter(|&page| page != 1).collect();
                let mut samples: Vec<(u32, StarEvent)> = Vec::with_capacity(rest.len() + 1);
                if let Some(star) = first.into_iter().next() {
                    samples.push((1, star));
                }
                for (page, stars) in self.fetch_pages(&repo.full_name, &rest).await? {
                    if let Some(star) = stars.into_iter().next() {
                        samples.push((page, star));
                    }
                }
                samples.sort_by_key(|(page, _)| *page);

                let page_size = u64::from(self.inner.config.page_size);
                let mut stars: Vec<StarEvent> = samples
                    .into_iter()
                    .map(|(page, star)| StarEvent {
                        ordinal: Some((u64::from(page) - 1) * page_size + 1),
                        ..star
                    })
                    .collect();
                stars.push(StarEvent {
                    starred_at: Utc::now(),
                    ordinal: Some(repo.stargazers_count),
                });
                Ok(stars)
            }
        }
    }

    /// First page, fetched unconditionally, and the last page number its
    /// `Link` header declares (1 when absent).
    async fn first_page(&self, full_name: &str) -> Result<(Vec<StarEvent>, u32)> {
        let url = self.stars_url(full_name, 1);
        match self.send(self.request(&url, Some(STAR_MEDIA_TYPE), None)).await? {
            Fetched::Fresh {
                body, last_page, ..
            } => Ok((serde_json::from_slice(&body)?, last_page.unwrap_or(1))),
            Fetched::NotModified => Err(Error::UpstreamApi(
                "304 answer to an unconditional request".to_string(),
            )),
        }
    }

    /// One stargazer page. `None` when the page is empty, i.e. past the end.
    async fn page(&self, full_name: &str, page: u32) -> Result<Option<Vec<StarEvent>>> {
        let url = self.stars_url(full_name, page);
        let stars: Vec<StarEvent> = self
            .get_conditional(&page_key(full_name, page), &url, Some(STAR_MEDIA_TYPE))
            .await?;
        if stars.is_empty() {
            debug!(page, "no more pages");
            return Ok(None);
        }
        Ok(Some(stars))
    }

    /// Fetch `pages` with at most `max_concurrent_requests` in flight.
    ///
    /// Empty pages are left out. The first hard failure aborts the rest.
    /// Results come back in completion order.
    async fn fetch_pages(
        &self,
        full_name: &str,
        pages: &[u32],
    ) -> Result<Vec<(u32, Vec<StarEvent>)>> {
        let concurrency = self.inner.config.max_concurrent_requests.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut join_set: JoinSet<Result<(u32, Option<Vec<StarEvent>>)>> = JoinSet::new();

        for &page in pages {
            let client = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let full_name = full_name.to_string();
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::Cancelled)?;
                let stars = client.page(&full_name, page).await?;
                Ok((page, stars))
            });
        }

        let mut fetched = Vec::with_capacity(pages.len());
        while let Some(joined) = join_set.join_next().await {
            match joined? {
                Ok((page, Some(stars))) => fetched.push((page, stars)),
                Ok((_, None)) => {}
                Err(e) => {
                    join_set.abort_all();
                    return Err(e);
                }
            }
        }
        Ok(fetched)
    }

    fn stars_url(&self, full_name: &str, page: u32) -> String {
        self.url(&format!(
            "/repos/{full_name}/stargazers?page={page}&per_page={}",
            self.inner.config.page_size
        ))
    }
}
