//! End-to-end engine tests driving `run_crawl` over an in-memory site graph
//! with fake renderer sessions. No browser or network involved.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use textcrawl::url_filter::CanonicalUrl;
use textcrawl::{
    CrawlEvent, CrawlEventBus, CrawlJob, NoOpProgress, RendererSession, RetryPolicy, SessionPool,
    run_crawl,
};

/// One fake page in the site graph.
#[derive(Clone, Default)]
struct FakePage {
    title: String,
    body_html: String,
    links: Vec<String>,
    /// Simulate a page whose body cannot be read after a successful load.
    body_fails: bool,
}

fn page(title: &str, links: &[&str]) -> FakePage {
    FakePage {
        title: title.to_string(),
        body_html: format!("<p>{title} body</p>"),
        links: links.iter().map(|l| (*l).to_string()).collect(),
        body_fails: false,
    }
}

/// Shared in-memory site plus instrumentation counters.
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, FakePage>,
    /// Navigation failures to inject before a URL starts succeeding;
    /// `u32::MAX` fails forever.
    remaining_failures: Mutex<HashMap<String, u32>>,
    nav_attempts: Mutex<HashMap<String, u32>>,
    sessions_used: Mutex<HashSet<usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSite {
    fn new(pages: HashMap<String, FakePage>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            ..Self::default()
        })
    }

    fn fail_navigation(&self, url: &str, times: u32) {
        self.remaining_failures
            .lock()
            .unwrap()
            .insert(url.to_string(), times);
    }

    fn attempts(&self, url: &str) -> u32 {
        self.nav_attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

struct FakeSession {
    id: usize,
    site: Arc<FakeSite>,
    current: Mutex<Option<String>>,
}

impl RendererSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.site.sessions_used.lock().unwrap().insert(self.id);
        let active = self.site.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.site.max_in_flight.fetch_max(active, Ordering::SeqCst);
        // Give batchmates a chance to overlap so concurrency is observable.
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.site.in_flight.fetch_sub(1, Ordering::SeqCst);

        *self
            .site
            .nav_attempts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        let should_fail = {
            let mut failures = self.site.remaining_failures.lock().unwrap();
            match failures.get_mut(url) {
                Some(left) if *left > 0 => {
                    *left = left.saturating_sub(1);
                    true
                }
                _ => false,
            }
        };
        if should_fail {
            anyhow::bail!("connection refused: {url}");
        }
        if !self.site.pages.contains_key(url) {
            anyhow::bail!("no route to {url}");
        }

        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        let current = self.current.lock().unwrap().clone().context("no page loaded")?;
        Ok(self.site.pages[&current].title.clone())
    }

    async fn body_html(&self) -> Result<String> {
        let current = self.current.lock().unwrap().clone().context("no page loaded")?;
        let page = &self.site.pages[&current];
        if page.body_fails {
            anyhow::bail!("document has no body");
        }
        Ok(page.body_html.clone())
    }

    async fn link_hrefs(&self) -> Result<Vec<String>> {
        let current = self.current.lock().unwrap().clone().context("no page loaded")?;
        Ok(self.site.pages[&current].links.clone())
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}

fn fake_pool(site: &Arc<FakeSite>, size: usize) -> SessionPool<FakeSession> {
    SessionPool::new(
        (0..size)
            .map(|id| FakeSession {
                id,
                site: Arc::clone(site),
                current: Mutex::new(None),
            })
            .collect(),
    )
}

/// Job with zero-delay retries so failure tests run instantly.
fn fast_job(start: &str, max_pages: usize, concurrency: usize, retries: u32) -> CrawlJob {
    CrawlJob::builder()
        .start_url(start)
        .max_pages(max_pages)
        .concurrency(concurrency)
        .retry_policy(RetryPolicy {
            max_attempts: retries,
            navigation_timeout: Duration::from_secs(5),
            settle_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
        })
        .build()
        .expect("test job")
}

fn result_urls(results: &[textcrawl::PageResult]) -> HashSet<String> {
    results.iter().map(|r| r.url.as_str().to_string()).collect()
}

#[tokio::test]
async fn crawls_in_scope_pages_and_skips_external_and_downloads() {
    let site = FakeSite::new(HashMap::from([
        (
            "https://example.com".to_string(),
            page("Home", &["/a", "/b", "http://other.com/c", "/report.pdf"]),
        ),
        ("https://example.com/a".to_string(), page("A", &[])),
        ("https://example.com/b".to_string(), page("B", &[])),
    ]));
    let pool = fake_pool(&site, 2);
    let job = fast_job("https://example.com", 3, 2, 3);

    let results = run_crawl(&job, &pool, &NoOpProgress, None).await.expect("crawl runs");

    assert_eq!(
        result_urls(&results),
        HashSet::from([
            "https://example.com".to_string(),
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string(),
        ])
    );
    // The out-of-scope host and the PDF were never navigated to.
    assert_eq!(site.attempts("http://other.com/c"), 0);
    assert_eq!(site.attempts("https://example.com/report.pdf"), 0);

    let home = results
        .iter()
        .find(|r| r.url.as_str() == "https://example.com")
        .expect("home crawled");
    assert_eq!(home.title, "Home");
    assert_eq!(home.text, "Home body");
}

#[tokio::test]
async fn reuses_a_fixed_set_of_sessions_bounded_by_concurrency() {
    let site = FakeSite::new(HashMap::from([
        (
            "https://example.com".to_string(),
            page("Home", &["/p1", "/p2", "/p3", "/p4"]),
        ),
        ("https://example.com/p1".to_string(), page("P1", &[])),
        ("https://example.com/p2".to_string(), page("P2", &[])),
        ("https://example.com/p3".to_string(), page("P3", &[])),
        ("https://example.com/p4".to_string(), page("P4", &[])),
    ]));
    let pool = fake_pool(&site, 2);
    assert_eq!(pool.size(), 2);
    let job = fast_job("https://example.com", 10, 2, 3);

    let results = run_crawl(&job, &pool, &NoOpProgress, None).await.expect("crawl runs");

    assert_eq!(results.len(), 5);
    assert!(site.sessions_used.lock().unwrap().len() <= 2);
    assert!(site.max_in_flight.load(Ordering::SeqCst) <= 2);
    // Every session came home.
    assert_eq!(pool.available_count(), 2);
}

#[tokio::test]
async fn failing_url_is_retried_to_the_limit_then_abandoned() {
    let site = FakeSite::new(HashMap::from([
        ("https://example.com".to_string(), page("Home", &["/flaky"])),
        ("https://example.com/flaky".to_string(), page("Flaky", &[])),
    ]));
    site.fail_navigation("https://example.com/flaky", u32::MAX);
    let pool = fake_pool(&site, 2);
    let job = fast_job("https://example.com", 10, 2, 3);

    let bus = Arc::new(CrawlEventBus::new(1024));
    let mut events = bus.subscribe();

    let results = run_crawl(&job, &pool, &NoOpProgress, Some(Arc::clone(&bus)))
        .await
        .expect("crawl runs");

    // The flaky page contributes no result and is attempted exactly the
    // retry limit, never again later in the run.
    assert_eq!(result_urls(&results), HashSet::from(["https://example.com".to_string()]));
    assert_eq!(site.attempts("https://example.com/flaky"), 3);

    let mut attempt_events = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CrawlEvent::CrawlError { url, attempt, .. } = event
            && url == "https://example.com/flaky"
        {
            attempt_events.push(attempt);
        }
    }
    // One event per failed attempt plus the terminal abandonment.
    assert_eq!(attempt_events.len(), 4);
    assert_eq!(attempt_events[..3], [Some(1), Some(2), Some(3)]);
}

#[tokio::test]
async fn transient_failures_recover_within_the_retry_budget() {
    let site = FakeSite::new(HashMap::from([
        ("https://example.com".to_string(), page("Home", &["/slow"])),
        ("https://example.com/slow".to_string(), page("Slow", &[])),
    ]));
    site.fail_navigation("https://example.com/slow", 2);
    let pool = fake_pool(&site, 1);
    let job = fast_job("https://example.com", 10, 1, 3);

    let results = run_crawl(&job, &pool, &NoOpProgress, None).await.expect("crawl runs");

    assert_eq!(results.len(), 2);
    assert_eq!(site.attempts("https://example.com/slow"), 3);
}

#[tokio::test]
async fn page_budget_bounds_the_crawl() {
    // A wide graph: home fans out to 20 pages, each fanning out further.
    let mut pages = HashMap::new();
    let fanout: Vec<String> = (0..20).map(|n| format!("/p{n}")).collect();
    let fanout_refs: Vec<&str> = fanout.iter().map(String::as_str).collect();
    pages.insert("https://example.com".to_string(), page("Home", &fanout_refs));
    for n in 0..20 {
        let child = format!("/p{n}/child");
        pages.insert(
            format!("https://example.com/p{n}"),
            page(&format!("P{n}"), &[child.as_str()]),
        );
        pages.insert(
            format!("https://example.com/p{n}/child"),
            page(&format!("C{n}"), &[]),
        );
    }
    let site = FakeSite::new(pages);

    let concurrency = 3;
    let max_pages = 5;
    let pool = fake_pool(&site, concurrency);
    let job = fast_job("https://example.com", max_pages, concurrency, 3);

    let results = run_crawl(&job, &pool, &NoOpProgress, None).await.expect("crawl runs");

    // Budget respected up to the bounded overshoot of in-flight batchmates.
    assert!(results.len() >= max_pages);
    assert!(results.len() <= max_pages + concurrency - 1);
    // No URL appears twice in the result set.
    assert_eq!(result_urls(&results).len(), results.len());
}

#[tokio::test]
async fn terminates_when_the_frontier_drains_before_the_budget() {
    // Cyclic cross-links; termination must come from the frontier running
    // dry, not from the page budget.
    let site = FakeSite::new(HashMap::from([
        ("https://example.com".to_string(), page("Home", &["/a", "/b"])),
        ("https://example.com/a".to_string(), page("A", &["/b", "/"])),
        ("https://example.com/b".to_string(), page("B", &["/a", "https://example.com"])),
    ]));
    let pool = fake_pool(&site, 2);
    let job = fast_job("https://example.com", 100, 2, 3);

    let results = tokio::time::timeout(
        Duration::from_secs(10),
        run_crawl(&job, &pool, &NoOpProgress, None),
    )
    .await
    .expect("crawl terminates")
    .expect("crawl runs");

    assert_eq!(results.len(), 3);
    assert_eq!(result_urls(&results).len(), 3);
}

#[tokio::test]
async fn degraded_extraction_still_yields_a_page_result() {
    let mut broken = page("Broken", &[]);
    broken.body_fails = true;
    let site = FakeSite::new(HashMap::from([
        ("https://example.com".to_string(), page("Home", &["/broken"])),
        ("https://example.com/broken".to_string(), broken),
    ]));
    let pool = fake_pool(&site, 1);
    let job = fast_job("https://example.com", 10, 1, 3);

    let bus = Arc::new(CrawlEventBus::new(256));
    let mut events = bus.subscribe();

    let results = run_crawl(&job, &pool, &NoOpProgress, Some(Arc::clone(&bus)))
        .await
        .expect("crawl runs");

    let broken_result = results
        .iter()
        .find(|r| r.url == CanonicalUrl::parse("https://example.com/broken").unwrap())
        .expect("broken page still contributes a result");
    assert_eq!(broken_result.text, "");
    assert_eq!(broken_result.title, "Broken");

    let mut saw_degradation = false;
    while let Ok(event) = events.try_recv() {
        if let CrawlEvent::CrawlError { url, attempt: None, .. } = event
            && url == "https://example.com/broken"
        {
            saw_degradation = true;
        }
    }
    assert!(saw_degradation, "extraction degradation should be reported");
}
