//! Error types for the title resolution module.
//!
//! Search failures are absorbed inside the resolver loop (a song that cannot
//! be resolved is reported, not fatal), but individual search backends return
//! structured errors so the loop can distinguish quota exhaustion from
//! transient network failures.

use thiserror::Error;

/// Errors that can occur while searching for a video match.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error searching for {query}: {reason}")]
    Network {
        /// The search query that failed.
        query: String,
        /// Description of the underlying network failure.
        reason: String,
    },

    /// Request timed out before completion.
    #[error("timeout searching for {query}")]
    Timeout {
        /// The search query that timed out.
        query: String,
    },

    /// HTTP error response from the search backend.
    #[error("HTTP {status} searching for {query}")]
    HttpStatus {
        /// The search query that returned an error status.
        query: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The API daily quota is exhausted; no further API calls should be made.
    #[error("search API quota exhausted")]
    QuotaExceeded,

    /// The search completed but produced no usable candidate.
    #[error("no results found for {query}")]
    NoMatches {
        /// The query that produced no candidates.
        query: String,
    },

    /// The backend responded with a body that could not be interpreted.
    #[error("unexpected response format searching for {query}")]
    BadResponse {
        /// The query whose response could not be parsed.
        query: String,
    },

    /// HTTP client construction failed.
    #[error("HTTP client construction failed: {reason}")]
    ClientBuild {
        /// Description of the builder failure.
        reason: String,
    },
}

impl SearchError {
    /// Creates a network error from a reqwest error, classifying timeouts.
    pub fn from_request(query: impl Into<String>, source: &reqwest::Error) -> Self {
        let query = query.into();
        if source.is_timeout() {
            Self::Timeout { query }
        } else {
            Self::Network {
                query,
                reason: source.to_string(),
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(query: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            query: query.into(),
            status,
        }
    }

    /// Creates a no-matches error.
    pub fn no_matches(query: impl Into<String>) -> Self {
        Self::NoMatches {
            query: query.into(),
        }
    }

    /// Returns true when the error signals sticky quota exhaustion.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded)
    }
}
