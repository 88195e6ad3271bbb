//! URL canonicalization and crawl-candidate filtering.
//!
//! Everything in this module is pure: canonicalize a URL into a single
//! comparable representation, decide whether it belongs to the site being
//! crawled, and reject links that point at downloadable payloads a renderer
//! cannot usefully parse.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// File extensions that identify binary/document payloads rather than pages.
const DOWNLOAD_EXTENSIONS: &[&str] = &[
    ".pdf", ".zip", ".rar", ".tar", ".gz", ".7z", ".exe", ".msi", ".dmg", ".pkg", ".deb", ".rpm",
    ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".mp3", ".mp4", ".avi", ".mov", ".jpg",
    ".jpeg", ".png", ".gif",
];

/// Matches path segments that conventionally serve file downloads.
/// Compiled once; link filtering sits on the discovery hot path.
static DOWNLOAD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(download|archive|attachment|file|document)s?")
        .expect("download pattern is a valid regex")
});

/// Errors produced while canonicalizing URLs.
#[derive(Debug, thiserror::Error)]
pub enum UrlError {
    #[error("invalid url `{url}`: {source}")]
    Invalid {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("url `{0}` has no host")]
    MissingHost(String),
}

/// A normalized absolute URL: scheme + host (+ explicit port) + path, with
/// the fragment dropped and any trailing slash removed. The query string is
/// preserved; distinct queries are distinct pages.
///
/// Normalization is idempotent: two URLs naming the same page compare equal,
/// and canonicalizing a `CanonicalUrl`'s string form returns it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    /// Parse and canonicalize an absolute URL.
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let parsed = Url::parse(raw).map_err(|source| UrlError::Invalid {
            url: raw.to_string(),
            source,
        })?;
        Self::from_url(&parsed)
    }

    /// Canonicalize an already-parsed URL.
    pub fn from_url(url: &Url) -> Result<Self, UrlError> {
        let host = url
            .host_str()
            .ok_or_else(|| UrlError::MissingHost(url.to_string()))?;

        let mut canonical = format!("{}://{}", url.scheme(), host);
        if let Some(port) = url.port() {
            canonical.push(':');
            canonical.push_str(&port.to_string());
        }
        canonical.push_str(url.path().trim_end_matches('/'));
        if let Some(query) = url.query() {
            canonical.push('?');
            canonical.push_str(query);
        }

        Ok(Self(canonical))
    }

    /// Resolve a possibly-relative reference against this URL, then
    /// canonicalize the result. Resolution is always against the page the
    /// link appeared on, never the crawl's start URL.
    pub fn resolve(&self, href: &str) -> Result<Self, UrlError> {
        let base = Url::parse(&self.0).map_err(|source| UrlError::Invalid {
            url: self.0.clone(),
            source,
        })?;
        let joined = base.join(href).map_err(|source| UrlError::Invalid {
            url: href.to_string(),
            source,
        })?;
        Self::from_url(&joined)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Same-site scope test anchored to the crawl's start host.
///
/// A URL is in scope iff its host equals the start host or the start host
/// prefixed with `www.`, compared case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeFilter {
    start_host: String,
    www_host: String,
}

impl ScopeFilter {
    /// Build the filter from the canonicalized start URL.
    pub fn for_start(start: &CanonicalUrl) -> Result<Self, UrlError> {
        let parsed = Url::parse(start.as_str()).map_err(|source| UrlError::Invalid {
            url: start.as_str().to_string(),
            source,
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| UrlError::MissingHost(start.as_str().to_string()))?
            .to_ascii_lowercase();
        let www_host = format!("www.{host}");
        Ok(Self {
            start_host: host,
            www_host,
        })
    }

    /// Whether a raw URL string is in scope. Unparseable URLs are not.
    #[must_use]
    pub fn in_scope(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => self.allows(&parsed),
            Err(_) => false,
        }
    }

    pub(crate) fn allows(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        host == self.start_host || host == self.www_host
    }
}

/// Whether a URL path points at a downloadable resource (by extension or by
/// a download/archive/attachment-style path segment).
#[must_use]
pub fn is_download_resource(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if DOWNLOAD_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return true;
    }
    DOWNLOAD_PATTERN.is_match(path)
}

/// Gate a discovered href into a crawl candidate.
///
/// Returns the canonical URL iff the href resolves (against the page it was
/// found on) to an absolute http/https URL that is in scope and is not a
/// download resource.
#[must_use]
pub fn crawl_candidate(page: &CanonicalUrl, href: &str, scope: &ScopeFilter) -> Option<CanonicalUrl> {
    let resolved = page.resolve(href).ok()?;
    let parsed = Url::parse(resolved.as_str()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    if !scope.allows(&parsed) {
        return None;
    }
    if is_download_resource(parsed.path()) {
        return None;
    }
    Some(resolved)
}
