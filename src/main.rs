//! textcrawl CLI: crawl a site and write the extracted text as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::{info, warn};

use textcrawl::{CrawlEvent, CrawlEventBus, CrawlJob};

#[derive(Parser, Debug)]
#[command(name = "textcrawl", version, about = "Crawl a site and extract readable text")]
struct Cli {
    /// URL to start crawling from (scheme optional, https assumed)
    url: String,

    /// Maximum number of pages to crawl
    #[arg(long, default_value_t = 100)]
    max_pages: usize,

    /// Concurrent fetches (and browser tabs)
    #[arg(long, default_value_t = 5)]
    concurrency: usize,

    /// Navigation attempts per URL before giving up
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Where to write the JSON result array
    #[arg(long, short, default_value = "crawl-output.json")]
    output: PathBuf,

    /// Run the browser with a visible window
    #[arg(long)]
    headed: bool,

    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    let job = CrawlJob::builder()
        .start_url(&cli.url)
        .max_pages(cli.max_pages)
        .concurrency(cli.concurrency)
        .retry_limit(cli.retries)
        .headless(!cli.headed)
        .build()?;

    let bus = Arc::new(CrawlEventBus::default());
    let mut events = bus.subscribe();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                CrawlEvent::PageCrawled { url, pages_crawled, .. } => {
                    info!("[{pages_crawled}] crawled {url}");
                }
                CrawlEvent::CrawlError { url, message, .. } => {
                    warn!("{url}: {message}");
                }
                CrawlEvent::CrawlCompleted { pages_crawled, duration, .. } => {
                    info!("done: {pages_crawled} pages in {:.1}s", duration.as_secs_f64());
                }
                _ => {}
            }
        }
    });

    let results = textcrawl::crawl_with_bus(job, Some(Arc::clone(&bus))).await?;
    textcrawl::write_results(&results, &cli.output).await?;

    drop(bus);
    let _ = reporter.await;

    println!(
        "Crawled {} pages -> {}",
        results.len(),
        cli.output.display()
    );
    Ok(())
}
