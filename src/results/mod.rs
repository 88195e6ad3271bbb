//! Crawl result shapes and the consumers of a completed result set.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::url_filter::CanonicalUrl;

/// One successfully fetched page. Results accumulate in completion order,
/// which is not deterministic across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub title: String,
    pub url: CanonicalUrl,
    pub text: String,
}

/// Outcome of partitioning a completed result set against a list of
/// requested URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredResults {
    pub found: Vec<PageResult>,
    pub missing: Vec<String>,
}

/// Partition a completed result set into pages found for the requested URLs
/// and URLs with no matching page. Requested URLs are canonicalized before
/// lookup; ones that fail to parse are reported as missing verbatim.
#[must_use]
pub fn partition_by_urls(results: &[PageResult], requested: &[String]) -> FilteredResults {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for raw in requested {
        let page = CanonicalUrl::parse(raw)
            .ok()
            .and_then(|url| results.iter().find(|r| r.url == url));
        match page {
            Some(page) => found.push(page.clone()),
            None => missing.push(raw.clone()),
        }
    }

    FilteredResults { found, missing }
}

/// Write the final result sequence as a pretty-printed JSON array, creating
/// parent directories as needed.
pub async fn write_results(results: &[PageResult], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    let json = serde_json::to_vec_pretty(results).context("Failed to serialize crawl results")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write results to {}", path.display()))?;

    log::info!("Wrote {} page results to {}", results.len(), path.display());
    Ok(())
}
