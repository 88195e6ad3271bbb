//! Type-safe builder for [`CrawlJob`] using the typestate pattern.
//!
//! The start URL is the one required field; the builder only exposes
//! `build()` once it has been provided. Validation that cannot happen at
//! compile time (URL shape, positive limits) happens in `build()` and fails
//! before any session or browser exists.

use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{Result, anyhow};
use url::Url;

use super::types::CrawlJob;
use crate::fetcher::RetryPolicy;
use crate::url_filter::{CanonicalUrl, ScopeFilter};

const DEFAULT_MAX_PAGES: usize = 100;
const DEFAULT_CONCURRENCY: usize = 5;

// Type states for the builder.
pub struct WithStartUrl;

pub struct CrawlJobBuilder<State = ()> {
    start_url: Option<String>,
    max_pages: usize,
    concurrency: usize,
    retry: RetryPolicy,
    headless: bool,
    _phantom: PhantomData<State>,
}

impl Default for CrawlJobBuilder<()> {
    fn default() -> Self {
        Self {
            start_url: None,
            max_pages: DEFAULT_MAX_PAGES,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            headless: true,
            _phantom: PhantomData,
        }
    }
}

impl CrawlJob {
    /// Create a builder for configuring a `CrawlJob` with a fluent interface.
    #[must_use]
    pub fn builder() -> CrawlJobBuilder<()> {
        CrawlJobBuilder::default()
    }
}

impl CrawlJobBuilder<()> {
    pub fn start_url(self, url: impl Into<String>) -> CrawlJobBuilder<WithStartUrl> {
        let url_string = url.into();

        // Accept bare hostnames the way people type them.
        let normalized = if url_string.starts_with("http://") || url_string.starts_with("https://")
        {
            url_string
        } else {
            format!("https://{url_string}")
        };

        CrawlJobBuilder {
            start_url: Some(normalized),
            max_pages: self.max_pages,
            concurrency: self.concurrency,
            retry: self.retry,
            headless: self.headless,
            _phantom: PhantomData,
        }
    }
}

impl<State> CrawlJobBuilder<State> {
    /// Page budget for the run.
    #[must_use]
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Concurrent fetch slots (and renderer sessions).
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Navigation attempts per URL before it is abandoned.
    #[must_use]
    pub fn retry_limit(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts;
        self
    }

    /// Hard cap on a single navigation attempt.
    #[must_use]
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.retry.navigation_timeout = timeout;
        self
    }

    /// Replace the whole retry schedule.
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

// Build is only available once the start URL is set.
impl CrawlJobBuilder<WithStartUrl> {
    pub fn build(self) -> Result<CrawlJob> {
        let raw = self
            .start_url
            .ok_or_else(|| anyhow!("start_url is required"))?;

        let parsed =
            Url::parse(&raw).map_err(|e| anyhow!("invalid start url `{raw}`: {e}"))?;
        let start_url = CanonicalUrl::from_url(&parsed)
            .map_err(|e| anyhow!("start url is not crawlable: {e}"))?;
        let scope = ScopeFilter::for_start(&start_url)
            .map_err(|e| anyhow!("start url has no usable host: {e}"))?;

        if self.max_pages == 0 {
            return Err(anyhow!("max_pages must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(anyhow!("concurrency must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry limit must be at least 1"));
        }

        Ok(CrawlJob {
            start_url,
            max_pages: self.max_pages,
            concurrency: self.concurrency,
            retry: self.retry,
            headless: self.headless,
            scope,
        })
    }
}
