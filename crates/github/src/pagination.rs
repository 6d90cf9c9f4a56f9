//! Page planning for stargazer collection

/// Pages to fetch after the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePlan {
    /// Every page from 2 through the last.
    Exhaustive(Vec<u32>),
    /// Evenly spaced page indices, ascending, always starting at 1.
    Sampled(Vec<u32>),
}

impl PagePlan {
    /// Choose between fetching everything and sampling.
    ///
    /// At or below `max_sample_pages` pages every page is fetched.
    pub fn new(last_page: u32, max_sample_pages: u32) -> Self {
        if last_page <= max_sample_pages {
            PagePlan::Exhaustive((2..=last_page).collect())
        } else {
            PagePlan::Sampled(sample_pages(last_page, max_sample_pages))
        }
    }

    pub fn pages(&self) -> &[u32] {
        match self {
            PagePlan::Exhaustive(pages) | PagePlan::Sampled(pages) => pages,
        }
    }

    pub fn is_sampled(&self) -> bool {
        matches!(self, PagePlan::Sampled(_))
    }
}

/// `max_samples` evenly spaced pages out of `total_pages`.
///
/// Page `i` of the sample is `round(i * total / max)` clamped to the valid
/// range, the first sample is forced to page 1 and duplicates are dropped.
/// Small totals can collapse neighbours, so the result may be shorter than
/// `max_samples`.
pub fn sample_pages(total_pages: u32, max_samples: u32) -> Vec<u32> {
    if total_pages == 0 || max_samples == 0 {
        return Vec::new();
    }

    let total = u64::from(total_pages);
    let max = u64::from(max_samples);
    let mut pages: Vec<u32> = (1..=max)
        .map(|i| {
            // round half away from zero, in integers
            let page = (2 * i * total + max) / (2 * max);
            page.clamp(1, total) as u32
        })
        .collect();
    pages[0] = 1;
    pages.dedup();
    pages
}

/// Last page number from a `Link` response header.
///
/// Looks for the `rel="last"` entry and reads its `page` query parameter.
pub fn parse_last_page(link_header: &str) -> Option<u32> {
    for part in link_header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(value) = segment.strip_prefix("rel=") {
                rel = Some(value.trim_matches('"'));
            }
        }

        if let (Some(url), Some("last")) = (url, rel) {
            return page_param(url);
        }
    }
    None
}

fn page_param(url: &str) -> Option<u32> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|param| param.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
}
