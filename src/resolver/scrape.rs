//! Quota-free fallback search backend that scrapes public results pages.
//!
//! [`ScrapeSearch`] fetches the HTML results page for a query with
//! browser-style headers and extracts embedded video IDs from the page's
//! inline player data. Shorts are excluded by their distinctive path form.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use tracing::{debug, warn};

use super::SearchError;
use super::http_client::{BROWSER_USER_AGENT, build_search_http_client};

/// Default public site base URL.
const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

/// At most this many distinct candidates are considered per page.
const MAX_CANDIDATES: usize = 15;

/// Matches inline player references of the form `"videoId":"<11 chars>"`.
fn video_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(r#""videoId":"([A-Za-z0-9_-]{11})""#).unwrap())
}

/// Searches for videos by scraping the public results page.
pub struct ScrapeSearch {
    client: Client,
    base_url: String,
}

impl ScrapeSearch {
    /// Creates a new `ScrapeSearch` against the production site.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if HTTP client construction fails.
    pub fn new() -> Result<Self, SearchError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a `ScrapeSearch` with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if HTTP client construction fails.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SearchError> {
        let client = build_search_http_client()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Finds the video ID of the `skip`-th candidate for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::NoMatches`] when the page yields no usable
    /// candidate, and network or status errors otherwise.
    #[tracing::instrument(skip(self), fields(query = %query, skip))]
    pub async fn search(&self, query: &str, skip: usize) -> Result<String, SearchError> {
        let search_query = query.split_whitespace().collect::<Vec<_>>().join("+");
        let url = format!("{}/results?search_query={search_query}", self.base_url);

        debug!("Fetching results page");

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| SearchError::from_request(query, &e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Results page returned an error");
            return Err(SearchError::http_status(query, status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::from_request(query, &e))?;

        extract_candidates(&html)
            .into_iter()
            .nth(skip)
            .ok_or_else(|| SearchError::no_matches(query))
    }
}

impl std::fmt::Debug for ScrapeSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeSearch")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Extracts distinct candidate video IDs from a results page, in page order.
///
/// IDs referenced anywhere in the page with a `/shorts/{id}` path are
/// excluded entirely. At most [`MAX_CANDIDATES`] IDs are returned.
#[must_use]
pub(crate) fn extract_candidates(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for capture in video_id_pattern().captures_iter(html) {
        let id = &capture[1];
        if !seen.insert(id.to_string()) {
            continue;
        }
        if html.contains(&format!("/shorts/{id}")) {
            continue;
        }
        candidates.push(id.to_string());
        if candidates.len() == MAX_CANDIDATES {
            break;
        }
    }

    candidates
}
