//! Event type definitions for the crawl progress stream.

use serde::{Deserialize, Serialize};

use crate::url_filter::CanonicalUrl;

/// Events emitted while a crawl runs. The engine publishes these
/// fire-and-forget; consumers subscribe through the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CrawlEvent {
    /// Emitted once, when the crawl starts.
    CrawlStarted {
        start_url: CanonicalUrl,
        max_pages: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A page was fetched and its text extracted. `pages_crawled` is the
    /// running total including this page.
    PageCrawled {
        url: CanonicalUrl,
        pages_crawled: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// In-scope links were discovered on a page and offered to the frontier.
    LinksDiscovered {
        url: CanonicalUrl,
        count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// The URL currently being fetched, or `None` between fetches.
    CurrentUrl {
        url: Option<CanonicalUrl>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A recoverable error: a failed navigation attempt, an exhausted retry
    /// budget, or a degraded extraction. Never fatal to the crawl.
    CrawlError {
        url: String,
        message: String,
        /// Attempt number for navigation failures; `None` for extraction
        /// degradations.
        attempt: Option<u32>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Emitted once, when the crawl finishes draining.
    CrawlCompleted {
        pages_crawled: usize,
        duration: std::time::Duration,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CrawlEvent {
    #[must_use]
    pub fn crawl_started(start_url: CanonicalUrl, max_pages: usize) -> Self {
        Self::CrawlStarted {
            start_url,
            max_pages,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn page_crawled(url: CanonicalUrl, pages_crawled: usize) -> Self {
        Self::PageCrawled {
            url,
            pages_crawled,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn links_discovered(url: CanonicalUrl, count: usize) -> Self {
        Self::LinksDiscovered {
            url,
            count,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn current_url(url: Option<CanonicalUrl>) -> Self {
        Self::CurrentUrl {
            url,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn crawl_error(
        url: impl Into<String>,
        message: impl Into<String>,
        attempt: Option<u32>,
    ) -> Self {
        Self::CrawlError {
            url: url.into(),
            message: message.into(),
            attempt,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn crawl_completed(pages_crawled: usize, duration: std::time::Duration) -> Self {
        Self::CrawlCompleted {
            pages_crawled,
            duration,
            timestamp: chrono::Utc::now(),
        }
    }
}
