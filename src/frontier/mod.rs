//! Shared mutable crawl state: visited set, pending queue, retry counters
//! and the result accumulator.
//!
//! All four collections live behind a single `std::sync::Mutex`; every
//! critical section is a handful of O(1) set/queue operations with no await
//! inside. Mutation happens only through the methods below, which keep the
//! invariants under any interleaving of concurrent per-URL tasks: a visited
//! URL is never re-enqueued, a URL appears in `pending` at most once, and
//! `visited` only grows.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::results::PageResult;
use crate::url_filter::CanonicalUrl;

#[derive(Debug, Default)]
struct FrontierInner {
    visited: HashSet<CanonicalUrl>,
    pending: VecDeque<CanonicalUrl>,
    /// Mirror of `pending` membership for O(1) dedup on enqueue.
    pending_set: HashSet<CanonicalUrl>,
    retry_counts: HashMap<CanonicalUrl, u32>,
    results: Vec<PageResult>,
}

/// The crawl frontier, exclusively owned by one engine run.
#[derive(Debug)]
pub struct Frontier {
    max_pages: usize,
    retry_limit: u32,
    inner: Mutex<FrontierInner>,
}

impl Frontier {
    /// Seed the frontier with the start URL.
    #[must_use]
    pub fn new(start: CanonicalUrl, max_pages: usize, retry_limit: u32) -> Self {
        let mut inner = FrontierInner::default();
        inner.pending_set.insert(start.clone());
        inner.pending.push_back(start);
        Self {
            max_pages,
            retry_limit,
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop up to `n` URLs from the front of the pending queue in discovery
    /// order, skipping (and discarding) any that were visited since they
    /// were enqueued.
    pub fn take_batch(&self, n: usize) -> Vec<CanonicalUrl> {
        let mut inner = self.lock();
        let mut batch = Vec::with_capacity(n);
        while batch.len() < n {
            let Some(url) = inner.pending.pop_front() else {
                break;
            };
            inner.pending_set.remove(&url);
            if !inner.visited.contains(&url) {
                batch.push(url);
            }
        }
        batch
    }

    /// Mark a URL visited. Returns `true` exactly once per URL; a `false`
    /// return means another task already claimed it and the caller must
    /// discard the URL.
    pub fn mark_visited(&self, url: &CanonicalUrl) -> bool {
        self.lock().visited.insert(url.clone())
    }

    #[must_use]
    pub fn is_visited(&self, url: &CanonicalUrl) -> bool {
        self.lock().visited.contains(url)
    }

    /// Offer discovered candidate links to the pending queue. Links already
    /// visited, already pending, or arriving after the page budget was met
    /// are discarded. Returns how many were accepted, preserving the order
    /// given.
    pub fn enqueue_discovered(&self, links: impl IntoIterator<Item = CanonicalUrl>) -> usize {
        let mut inner = self.lock();
        let mut accepted = 0;
        for link in links {
            if inner.visited.len() >= self.max_pages {
                break;
            }
            if inner.visited.contains(&link) || inner.pending_set.contains(&link) {
                continue;
            }
            inner.pending_set.insert(link.clone());
            inner.pending.push_back(link);
            accepted += 1;
        }
        accepted
    }

    /// Record one failed fetch attempt for a URL. The stored count saturates
    /// at the configured retry limit.
    pub fn record_retry(&self, url: &CanonicalUrl) -> u32 {
        let mut inner = self.lock();
        let retry_limit = self.retry_limit;
        let count = inner.retry_counts.entry(url.clone()).or_insert(0);
        *count = (*count + 1).min(retry_limit);
        *count
    }

    /// Attempts recorded so far for a URL.
    #[must_use]
    pub fn retry_count(&self, url: &CanonicalUrl) -> u32 {
        self.lock().retry_counts.get(url).copied().unwrap_or(0)
    }

    /// Append a page result, returning the new result count.
    pub fn record_result(&self, result: PageResult) -> usize {
        let mut inner = self.lock();
        inner.results.push(result);
        inner.results.len()
    }

    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether the engine should form another batch: pending work exists and
    /// the page budget has not been reached.
    #[must_use]
    pub fn should_continue(&self) -> bool {
        let inner = self.lock();
        !inner.pending.is_empty() && inner.visited.len() < self.max_pages
    }

    /// Finalize the frontier, yielding the accumulated results.
    #[must_use]
    pub fn into_results(self) -> Vec<PageResult> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> CanonicalUrl {
        CanonicalUrl::parse(raw).expect("test url")
    }

    fn frontier(max_pages: usize) -> Frontier {
        Frontier::new(url("https://example.com"), max_pages, 3)
    }

    #[test]
    fn seeds_with_start_url() {
        let f = frontier(10);
        assert_eq!(f.take_batch(5), vec![url("https://example.com")]);
        assert_eq!(f.pending_count(), 0);
    }

    #[test]
    fn enqueue_dedups_against_pending_and_visited() {
        let f = frontier(10);
        assert!(f.mark_visited(&url("https://example.com/seen")));

        let accepted = f.enqueue_discovered(vec![
            url("https://example.com/a"),
            url("https://example.com/a"),
            url("https://example.com/seen"),
            url("https://example.com/b"),
        ]);
        assert_eq!(accepted, 2);

        // First-in-first-out, discovery order.
        let batch = f.take_batch(10);
        assert_eq!(
            batch,
            vec![
                url("https://example.com"),
                url("https://example.com/a"),
                url("https://example.com/b"),
            ]
        );
    }

    #[test]
    fn mark_visited_claims_exactly_once() {
        let f = frontier(10);
        let target = url("https://example.com/page");
        assert!(f.mark_visited(&target));
        assert!(!f.mark_visited(&target));
        assert_eq!(f.visited_count(), 1);
    }

    #[test]
    fn budget_stops_enqueue() {
        let f = frontier(2);
        f.mark_visited(&url("https://example.com/1"));
        f.mark_visited(&url("https://example.com/2"));

        let accepted = f.enqueue_discovered(vec![url("https://example.com/3")]);
        assert_eq!(accepted, 0);
        assert!(!f.should_continue());
    }

    #[test]
    fn take_batch_skips_urls_visited_after_enqueue() {
        let f = frontier(10);
        f.enqueue_discovered(vec![url("https://example.com/a"), url("https://example.com/b")]);
        f.mark_visited(&url("https://example.com/a"));
        // The seed URL plus /b; /a was claimed in the meantime.
        let batch = f.take_batch(10);
        assert_eq!(batch, vec![url("https://example.com"), url("https://example.com/b")]);
    }

    #[test]
    fn retry_counts_saturate_at_limit() {
        let f = frontier(10);
        let target = url("https://example.com/flaky");
        assert_eq!(f.record_retry(&target), 1);
        assert_eq!(f.record_retry(&target), 2);
        assert_eq!(f.record_retry(&target), 3);
        assert_eq!(f.record_retry(&target), 3);
        assert_eq!(f.retry_count(&target), 3);
    }
}
