//! Chromium-backed renderer session.
//!
//! Wraps one `chromiumoxide::Page` per session. DOM reads go through small
//! JavaScript evaluation scripts so the browser does the heavy lifting of
//! relative-URL resolution and body traversal.

use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide_cdp::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};

use super::RendererSession;

/// Subresource patterns blocked on every session. Only text and anchors
/// are read, so binary subresources never go over the wire.
const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.svg", "*.webp", "*.ico", "*.css", "*.woff",
    "*.woff2", "*.ttf", "*.otf", "*.mp3", "*.mp4", "*.avi", "*.mov",
];

/// Inner HTML of the body, or `null` when the document has no body (error
/// pages, raw XML responses).
const BODY_HTML_SCRIPT: &str = "document.body ? document.body.innerHTML : null";

/// Resolved absolute hrefs of all anchors. Resolution happens browser-side
/// against the page's own location; non-http(s) schemes are dropped here so
/// `javascript:`/`mailto:` links never leave the page.
const LINK_HREFS_SCRIPT: &str = r"
    (() => {
        return Array.from(document.querySelectorAll('a[href]'))
            .map(a => {
                const href = a.getAttribute('href');
                if (!href) return null;
                try {
                    const resolved = new URL(href, window.location.href);
                    if (!['http:', 'https:'].includes(resolved.protocol)) {
                        return null;
                    }
                    return resolved.href;
                } catch (e) {
                    return null;
                }
            })
            .filter(href => href !== null);
    })()
";

/// One browser tab, pooled and reused across fetches for the lifetime of a
/// crawl.
#[derive(Debug)]
pub struct ChromeSession {
    page: Page,
}

impl ChromeSession {
    /// Open a fresh tab and configure request blocking for binary
    /// subresources.
    pub async fn create(browser: &Browser) -> Result<Self> {
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create browser page")?;

        page.execute(EnableParams::default())
            .await
            .context("Failed to enable network domain")?;
        page.execute(SetBlockedUrLsParams {
            urls: BLOCKED_URL_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        })
        .await
        .context("Failed to configure blocked resource patterns")?;

        Ok(Self { page })
    }
}

impl RendererSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| anyhow::anyhow!("navigation to {url} failed: {e}"))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| anyhow::anyhow!("load of {url} did not complete: {e}"))?;
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read title: {e}"))?;
        Ok(title.unwrap_or_default())
    }

    async fn body_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate(BODY_HTML_SCRIPT)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read body: {e}"))?;
        let value: Option<String> = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to decode body html: {e}"))?;
        value.context("document has no body")
    }

    async fn link_hrefs(&self) -> Result<Vec<String>> {
        let result = self
            .page
            .evaluate(LINK_HREFS_SCRIPT)
            .await
            .map_err(|e| anyhow::anyhow!("failed to collect anchors: {e}"))?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to decode anchor list: {e}"))
    }

    async fn close(self) -> Result<()> {
        self.page
            .close()
            .await
            .map_err(|e| anyhow::anyhow!("failed to close page: {e}"))?;
        Ok(())
    }
}
