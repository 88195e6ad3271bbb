//! Crawl job configuration.

use serde::{Deserialize, Serialize};

use crate::fetcher::RetryPolicy;
use crate::url_filter::{CanonicalUrl, ScopeFilter};

/// Immutable configuration for one crawl run, validated at construction.
/// Use [`CrawlJob::builder`]; an invalid start URL or a zero page budget,
/// concurrency or retry limit fails the build before any browser resource
/// is allocated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub(crate) start_url: CanonicalUrl,
    pub(crate) max_pages: usize,
    pub(crate) concurrency: usize,
    pub(crate) retry: RetryPolicy,
    pub(crate) headless: bool,
    pub(crate) scope: ScopeFilter,
}

impl CrawlJob {
    #[must_use]
    pub fn start_url(&self) -> &CanonicalUrl {
        &self.start_url
    }

    /// Page budget: the crawl drains once this many URLs are visited.
    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Concurrent fetch slots; also the renderer session pool size.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn scope(&self) -> &ScopeFilter {
        &self.scope
    }
}
