//! Bounded same-site BFS crawling through a rendering browser.
//!
//! Given a start URL and a page budget, the engine discovers and fetches
//! pages with a fixed pool of reusable Chrome sessions, extracts readable
//! text and outbound links, and produces an ordered set of
//! [`PageResult`]s. Per-URL failures are retried with backoff and reported
//! as events; only configuration errors fail a run.
//!
//! ```rust,ignore
//! use textcrawl::CrawlJob;
//!
//! let job = CrawlJob::builder()
//!     .start_url("https://example.com")
//!     .max_pages(50)
//!     .concurrency(5)
//!     .build()?;
//! let results = textcrawl::crawl(job).await?;
//! ```

pub mod browser_setup;
pub mod config;
pub mod crawl_engine;
pub mod crawl_events;
pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod results;
pub mod session_pool;
pub mod url_filter;

use std::sync::Arc;

use anyhow::{Context, Result};
use chromiumoxide::browser::Browser;
use log::warn;

pub use config::{CrawlJob, CrawlJobBuilder};
pub use crawl_engine::{NoOpProgress, ProgressReporter, run_crawl};
pub use crawl_events::{CrawlEvent, CrawlEventBus};
pub use fetcher::{FetchError, RetryPolicy};
pub use results::{FilteredResults, PageResult, partition_by_urls, write_results};
pub use session_pool::{ChromeSession, RendererSession, SessionGuard, SessionPool};
pub use url_filter::{CanonicalUrl, ScopeFilter};

/// Crawl with the default (no-op) progress reporter and no event bus.
pub async fn crawl(job: CrawlJob) -> Result<Vec<PageResult>> {
    crawl_with_bus(job, None).await
}

/// Crawl, publishing progress events to `event_bus` if given.
///
/// Launches the browser, eagerly creates one session per concurrency slot,
/// runs the engine to completion, and tears everything down on every path.
pub async fn crawl_with_bus(
    job: CrawlJob,
    event_bus: Option<Arc<CrawlEventBus>>,
) -> Result<Vec<PageResult>> {
    let (mut browser, handler_task, user_data_dir) =
        browser_setup::launch_browser(job.headless()).await?;

    let outcome = crawl_with_browser(&job, &browser, event_bus).await;

    if let Err(e) = browser.close().await {
        warn!("Failed to close browser: {e}");
    }
    let _ = browser.wait().await;
    handler_task.abort();
    if let Err(e) = handler_task.await
        && !e.is_cancelled()
    {
        warn!("Browser handler task failed during abort: {e}");
    }
    if let Err(e) = tokio::fs::remove_dir_all(&user_data_dir).await {
        log::debug!(
            "Could not remove browser profile {}: {e}",
            user_data_dir.display()
        );
    }

    outcome
}

async fn crawl_with_browser(
    job: &CrawlJob,
    browser: &Browser,
    event_bus: Option<Arc<CrawlEventBus>>,
) -> Result<Vec<PageResult>> {
    let mut sessions = Vec::with_capacity(job.concurrency());
    for _ in 0..job.concurrency() {
        sessions.push(
            ChromeSession::create(browser)
                .await
                .context("Failed to prepare renderer session")?,
        );
    }
    let pool = SessionPool::new(sessions);

    let results = run_crawl(job, &pool, &NoOpProgress, event_bus).await;

    if let Err(e) = pool.shutdown().await {
        warn!("Session pool teardown failed: {e:#}");
    }
    results
}
