//! Shared HTTP client construction policy for search backends.
//!
//! Centralizes search networking defaults so the API and scrape backends
//! stay consistent on timeout, compression, and header handling.

use std::time::Duration;

use reqwest::Client;

use super::SearchError;

const CONNECT_TIMEOUT_SECS: u64 = 8;
const READ_TIMEOUT_SECS: u64 = 10;

/// Browser-style user agent sent on scrape requests so result pages render
/// the same markup a real browser receives.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Builds a search HTTP client using shared project policy.
///
/// # Errors
///
/// Returns [`SearchError::ClientBuild`] when client construction fails.
pub fn build_search_http_client() -> Result<Client, SearchError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
        .gzip(true)
        .build()
        .map_err(|e| SearchError::ClientBuild {
            reason: e.to_string(),
        })
}
