//! Readable-text and link extraction from rendered pages.
//!
//! Extraction never fails a page: each DOM read that errors degrades to an
//! empty value and is surfaced through the caller's warning callback, and a
//! page with empty text still counts as crawled.

use std::collections::HashSet;

use scraper::{ElementRef, Html};

use crate::session_pool::RendererSession;
use crate::url_filter::{CanonicalUrl, ScopeFilter, crawl_candidate};

/// Elements dropped wholesale before text collection: non-content by
/// definition, or conventional navigation/boilerplate containers.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "navbar", "header", "footer", "aside", "ads",
];

/// Class names marking navigation/boilerplate containers.
const SKIP_CLASSES: &[&str] = &["navbar", "nav", "header", "footer", "ads", "ad"];

/// Everything the fetcher pulled out of a session for one page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: CanonicalUrl,
    pub title: String,
    pub body_html: String,
    pub hrefs: Vec<String>,
}

/// Read title, body HTML and anchor hrefs out of a navigated session.
/// Individual read failures degrade to empty values and are reported via
/// `on_warning`.
pub async fn read_rendered_page<S, F>(session: &S, url: &CanonicalUrl, mut on_warning: F) -> RenderedPage
where
    S: RendererSession,
    F: FnMut(&str),
{
    let title = match session.title().await {
        Ok(title) => title,
        Err(e) => {
            on_warning(&format!("failed to read title: {e:#}"));
            String::new()
        }
    };

    let body_html = match session.body_html().await {
        Ok(html) => html,
        Err(e) => {
            on_warning(&format!("failed to read body: {e:#}"));
            String::new()
        }
    };

    let hrefs = match session.link_hrefs().await {
        Ok(hrefs) => hrefs,
        Err(e) => {
            on_warning(&format!("failed to collect links: {e:#}"));
            Vec::new()
        }
    };

    RenderedPage {
        url: url.clone(),
        title,
        body_html,
        hrefs,
    }
}

/// Extract visible text from a body-HTML fragment, stripping script/style
/// and boilerplate elements, with whitespace collapsed to single spaces.
#[must_use]
pub fn extract_text(body_html: &str) -> String {
    let fragment = Html::parse_fragment(body_html);
    let mut raw = String::new();
    collect_text(fragment.root_element(), &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if !is_boilerplate(el) {
                collect_text(el, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
}

fn is_boilerplate(el: ElementRef<'_>) -> bool {
    let tag = el.value().name();
    if SKIP_TAGS.contains(&tag) {
        return true;
    }
    el.value()
        .classes()
        .any(|class| SKIP_CLASSES.iter().any(|skip| class.eq_ignore_ascii_case(skip)))
}

/// Turn raw anchor hrefs into deduplicated crawl candidates: resolved
/// against the page they were found on, in scope, and not download
/// resources. First-seen order is preserved.
#[must_use]
pub fn candidate_links(
    page: &CanonicalUrl,
    hrefs: &[String],
    scope: &ScopeFilter,
) -> Vec<CanonicalUrl> {
    let mut seen = HashSet::new();
    hrefs
        .iter()
        .filter_map(|href| crawl_candidate(page, href, scope))
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}
