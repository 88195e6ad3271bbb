//! Breadth-first crawl orchestration.
//!
//! The engine runs in rounds: take up to `concurrency` URLs from the front
//! of the frontier, run one fetch task per URL concurrently, and wait for
//! the whole batch before forming the next. The batch join bounds task
//! fan-out. Once the frontier is drained or the page budget is reached,
//! in-flight fetches finish, the pool's sessions come back, and the
//! accumulated results are finalized.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures::future::join_all;
use log::{debug, info, warn};

use super::progress::ProgressReporter;
use crate::config::CrawlJob;
use crate::crawl_events::{CrawlEvent, CrawlEventBus};
use crate::extractor::{candidate_links, extract_text, read_rendered_page};
use crate::fetcher::{FetchError, fetch_with_retry};
use crate::frontier::Frontier;
use crate::results::PageResult;
use crate::session_pool::{RendererSession, SessionPool};
use crate::url_filter::CanonicalUrl;

/// Run a crawl job against a pool of renderer sessions.
///
/// Returns the accumulated page results in completion order. Per-URL
/// failures (navigation errors, exhausted retries, degraded extraction) are
/// absorbed and reported as events; nothing a page does can fail the run.
pub async fn run_crawl<S, P>(
    job: &CrawlJob,
    pool: &SessionPool<S>,
    progress: &P,
    event_bus: Option<Arc<CrawlEventBus>>,
) -> Result<Vec<PageResult>>
where
    S: RendererSession,
    P: ProgressReporter,
{
    let started = Instant::now();
    let frontier = Frontier::new(
        job.start_url().clone(),
        job.max_pages(),
        job.retry_policy().max_attempts,
    );

    progress.report_crawl_started(job.start_url());
    if let Some(bus) = &event_bus {
        bus.publish(CrawlEvent::crawl_started(
            job.start_url().clone(),
            job.max_pages(),
        ));
    }
    info!(
        "Starting crawl of {} (budget {} pages, {} sessions)",
        job.start_url(),
        job.max_pages(),
        pool.size()
    );

    while frontier.should_continue() {
        let batch = frontier.take_batch(job.concurrency());
        if batch.is_empty() {
            // Everything left in pending had been visited in the meantime.
            continue;
        }

        debug!(
            "Dispatching batch of {} ({} visited, {} pending)",
            batch.len(),
            frontier.visited_count(),
            frontier.pending_count()
        );

        let tasks = batch.into_iter().map(|url| {
            process_url(url, job, &frontier, pool, progress, event_bus.as_deref())
        });
        join_all(tasks).await;
    }

    let results = frontier.into_results();
    progress.report_completed(results.len());
    if let Some(bus) = &event_bus {
        bus.publish(CrawlEvent::crawl_completed(results.len(), started.elapsed()));
    }
    info!(
        "Crawl of {} finished: {} pages in {:.1}s",
        job.start_url(),
        results.len(),
        started.elapsed().as_secs_f64()
    );

    Ok(results)
}

/// One dispatched URL, from session lease to discovered links.
///
/// The session guard is held across the whole fetch and returned on drop on
/// every path, so a failed navigation still hands its session back.
async fn process_url<S, P>(
    url: CanonicalUrl,
    job: &CrawlJob,
    frontier: &Frontier,
    pool: &SessionPool<S>,
    progress: &P,
    event_bus: Option<&CrawlEventBus>,
) where
    S: RendererSession,
    P: ProgressReporter,
{
    // A URL can be enqueued from several source pages before its first
    // dispatch; dedup again here, not only at enqueue.
    if frontier.is_visited(&url) {
        return;
    }

    let session = match pool.acquire().await {
        Ok(guard) => guard,
        Err(e) => {
            // Only reachable if the pool was torn down under us.
            warn!("Could not lease a session for {url}: {e:#}");
            return;
        }
    };

    // Claim the URL exactly once, before navigation, so a later batch can
    // never dispatch it again while this fetch is in flight.
    if !frontier.mark_visited(&url) {
        return;
    }

    progress.report_fetch_started(&url);
    if let Some(bus) = event_bus {
        bus.publish(CrawlEvent::current_url(Some(url.clone())));
    }
    info!(
        "Crawling ({}/{}): {url}",
        frontier.visited_count(),
        job.max_pages()
    );

    let fetched = fetch_with_retry(&*session, url.as_str(), job.retry_policy(), |attempt, cause| {
        frontier.record_retry(&url);
        warn!("Attempt {attempt} failed for {url}: {cause}");
        if let Some(bus) = event_bus {
            bus.publish(CrawlEvent::crawl_error(url.as_str(), cause, Some(attempt)));
        }
    })
    .await;

    match fetched {
        Ok(()) => {}
        Err(FetchError::RetriesExhausted { attempts, last_error }) => {
            // The URL stays visited so it is never re-enqueued; it simply
            // contributes no result.
            progress.report_fetch_failed(&url, attempts, &last_error);
            if let Some(bus) = event_bus {
                bus.publish(CrawlEvent::crawl_error(
                    url.as_str(),
                    format!("abandoned after {attempts} attempts: {last_error}"),
                    Some(attempts),
                ));
                bus.publish(CrawlEvent::current_url(None));
            }
            return;
        }
    }

    let rendered = read_rendered_page(&*session, &url, |warning| {
        warn!("Extraction degraded for {url}: {warning}");
        if let Some(bus) = event_bus {
            bus.publish(CrawlEvent::crawl_error(url.as_str(), warning, None));
        }
    })
    .await;
    drop(session);

    let text = extract_text(&rendered.body_html);
    let links = candidate_links(&url, &rendered.hrefs, job.scope());

    let total = frontier.record_result(PageResult {
        title: rendered.title,
        url: url.clone(),
        text,
    });
    progress.report_page_crawled(&url, total);
    if let Some(bus) = event_bus {
        bus.publish(CrawlEvent::page_crawled(url.clone(), total));
        bus.publish(CrawlEvent::links_discovered(url.clone(), links.len()));
    }

    let accepted = frontier.enqueue_discovered(links);
    debug!("Enqueued {accepted} new links from {url}");

    if let Some(bus) = event_bus {
        bus.publish(CrawlEvent::current_url(None));
    }
}
