//! Page fetching for configured sites.
//!
//! The orchestrator never talks to the network directly. It goes through a
//! [`SiteFetcher`], which layers three things over an opaque [`PageSource`]:
//!
//! 1. **Retry**: every fetch runs through [`RetryFetch`] (bounded attempts,
//!    backoff, per-attempt timeout)
//! 2. **Candidate discovery**: a site's homepage links are filtered down to
//!    likely article URLs, capped per site
//! 3. **Quality check**: articles with too little text count as failures
//!
//! # Page sources
//!
//! | Source | Module | Notes |
//! |--------|--------|-------|
//! | HTTP + HTML extraction | [`browser`] | Production capability |
//! | Scripted pages | `stub` | Tests only |

pub mod browser;
pub mod retry;
#[cfg(test)]
pub mod stub;

use crate::config::{LinkFilter, RetryPolicy, SiteDescriptor};
use crate::errors::FetchError;
use crate::models::Page;
use crate::utils::normalize_text;
use async_trait::async_trait;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

pub use browser::HttpPageSource;
pub use retry::RetryFetch;

/// The capability to turn a URL into page text and links.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Make the capability ready for use. Failure here ends the run.
    async fn prepare(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Fetch a single page. One attempt, no retries.
    async fn fetch_page(&self, url: &str) -> Result<Page, FetchError>;
}

#[async_trait]
impl<T: PageSource + ?Sized> PageSource for Arc<T> {
    async fn prepare(&self) -> Result<(), FetchError> {
        (**self).prepare().await
    }

    async fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
        (**self).fetch_page(url).await
    }
}

/// Site-level fetch operations used by the orchestrator.
pub struct SiteFetcher {
    source: RetryFetch<Arc<dyn PageSource>>,
    links: LinkFilter,
    max_articles_per_site: usize,
    min_content_length: usize,
}

impl SiteFetcher {
    pub fn new(
        source: Arc<dyn PageSource>,
        retry: RetryPolicy,
        links: LinkFilter,
        max_articles_per_site: usize,
        min_content_length: usize,
    ) -> Self {
        Self {
            source: RetryFetch::new(source, retry),
            links,
            max_articles_per_site,
            min_content_length,
        }
    }

    pub async fn prepare(&self) -> Result<(), FetchError> {
        self.source.prepare().await
    }

    /// Candidate article URLs for `site`, in the order they appear on its
    /// homepage, at most `max_articles_per_site` of them.
    #[instrument(level = "info", skip_all, fields(site = %site.name))]
    pub async fn fetch_candidates(&self, site: &SiteDescriptor) -> Result<Vec<String>, FetchError> {
        let homepage = self.source.fetch_page(&site.base_url).await?;
        let candidates = candidate_links(&site.base_url, &homepage.links, &self.links)
            .into_iter()
            .take(self.max_articles_per_site)
            .collect::<Vec<_>>();
        info!(
            found = homepage.links.len(),
            candidates = candidates.len(),
            "Discovered candidate article URLs"
        );
        debug!(urls = ?candidates, "Candidates");
        Ok(candidates)
    }

    /// Fetch one article. Pages with too little text are reported as a
    /// failed fetch without being retried.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn fetch_article_text(&self, url: &str) -> Result<Page, FetchError> {
        let page = self.source.fetch_page(url).await?;
        let length = normalize_text(&page.content).chars().count();
        if length <= self.min_content_length {
            return Err(FetchError::new(
                url,
                format!("low quality content ({length} chars)"),
            ));
        }
        Ok(page)
    }
}

/// Filter a homepage's links down to likely articles on the same host.
pub fn candidate_links(base_url: &str, links: &[String], filter: &LinkFilter) -> Vec<String> {
    let base_host = Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    let Some(base_host) = base_host else {
        return Vec::new();
    };
    let base_normalized = base_url.trim_end_matches('/');

    links
        .iter()
        .filter(|href| {
            Url::parse(href)
                .ok()
                .and_then(|u| u.host_str().map(|h| h == base_host))
                .unwrap_or(false)
        })
        .filter(|href| href.trim_end_matches('/') != base_normalized)
        .filter(|href| !filter.skip_patterns.iter().any(|p| href.contains(p.as_str())))
        .filter(|href| {
            let lower = href.to_lowercase();
            filter
                .include_keywords
                .iter()
                .any(|k| lower.contains(&k.to_lowercase()))
        })
        .unique()
        .cloned()
        .collect()
}
