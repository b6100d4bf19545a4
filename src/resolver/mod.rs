//! Title resolution pipeline for turning song names into playable video IDs.
//!
//! This module provides a two-tier search system: a quota-metered API backend
//! tried first, and a scrape backend used when no API key is configured or
//! the daily quota runs out. Quota exhaustion is sticky for the lifetime of
//! the resolver, so a batch never wastes further API calls once a quota
//! error is seen.
//!
//! # Architecture
//!
//! - [`TitleResolver`] - Orchestrates backends and query variations
//! - [`ApiSearch`] - Data API search backend (quota-metered)
//! - [`ScrapeSearch`] - Results-page scrape backend (quota-free fallback)
//! - [`MediaReference`] - A resolved video ID plus its provenance
//!
//! # Example
//!
//! ```no_run
//! use songfetch_core::resolver::{ResolverConfig, TitleResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = TitleResolver::new(ResolverConfig::default())?;
//! if let Some(media) = resolver.resolve("Shape of You").await {
//!     println!("Found {}", media.watch_url());
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod error;
mod http_client;
mod scrape;
mod variations;

pub use api::ApiSearch;
pub use error::SearchError;
pub use scrape::ScrapeSearch;
pub use variations::generate_search_variations;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::db::UsageCounter;

/// Length of a well-formed video ID.
pub const VIDEO_ID_LEN: usize = 11;

/// Which backend produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// The quota-metered Data API.
    PrimaryApi,
    /// The results-page scrape fallback.
    FallbackScrape,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrimaryApi => write!(f, "api"),
            Self::FallbackScrape => write!(f, "scrape"),
        }
    }
}

/// A resolved video reference with provenance.
#[derive(Debug, Clone)]
pub struct MediaReference {
    /// The 11-character video ID.
    pub video_id: String,
    /// Which backend found it.
    pub source: SourceKind,
    /// When the resolution happened.
    pub resolved_at: SystemTime,
}

impl MediaReference {
    /// Creates a reference resolved at the current instant.
    #[must_use]
    pub fn new(video_id: impl Into<String>, source: SourceKind) -> Self {
        Self {
            video_id: video_id.into(),
            source,
            resolved_at: SystemTime::now(),
        }
    }

    /// Canonical watch URL for this reference.
    #[must_use]
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// Sticky quota flag shared across all searches in a process.
///
/// The transition is one-way: once marked exhausted, the flag never resets.
#[derive(Debug, Default)]
pub struct QuotaState {
    exhausted: AtomicBool,
}

impl QuotaState {
    /// Creates a fresh, non-exhausted state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once quota exhaustion has been observed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Relaxed)
    }

    /// Marks the quota as exhausted. Idempotent.
    pub fn mark_exhausted(&self) {
        self.exhausted.store(true, Ordering::Relaxed);
    }
}

/// Configuration for [`TitleResolver`].
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// API key for the primary backend. `None` disables the API entirely.
    pub api_key: Option<String>,
    /// Override for the API base URL (for testing with wiremock).
    pub api_base_url: Option<String>,
    /// Override for the scrape base URL (for testing with wiremock).
    pub scrape_base_url: Option<String>,
    /// Number of query variations tried after the literal name fails.
    pub max_attempts: Option<usize>,
    /// Pause between consecutive search attempts for one song.
    pub retry_pause: Option<Duration>,
    /// Search usage counter, bumped best-effort per completed search call.
    pub usage: Option<Arc<UsageCounter>>,
}

/// Default number of variation attempts after the literal name.
const DEFAULT_MAX_ATTEMPTS: usize = 1;

/// Default pause between attempts, to avoid hammering backends.
const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Resolves song names to video references via prioritized search backends.
pub struct TitleResolver {
    api: Option<ApiSearch>,
    scrape: ScrapeSearch,
    quota: QuotaState,
    max_attempts: usize,
    retry_pause: Duration,
    usage: Option<Arc<UsageCounter>>,
}

impl TitleResolver {
    /// Creates a resolver from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if HTTP client construction fails.
    pub fn new(config: ResolverConfig) -> Result<Self, SearchError> {
        let api = match config.api_key {
            Some(key) => Some(match config.api_base_url {
                Some(base) => ApiSearch::with_base_url(key, base)?,
                None => ApiSearch::new(key)?,
            }),
            None => None,
        };
        let scrape = match config.scrape_base_url {
            Some(base) => ScrapeSearch::with_base_url(base)?,
            None => ScrapeSearch::new()?,
        };

        Ok(Self {
            api,
            scrape,
            quota: QuotaState::new(),
            max_attempts: config.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            retry_pause: config.retry_pause.unwrap_or(DEFAULT_RETRY_PAUSE),
            usage: config.usage,
        })
    }

    /// Returns true once the API quota has been observed to be exhausted.
    #[must_use]
    pub fn quota_exhausted(&self) -> bool {
        self.quota.is_exhausted()
    }

    /// Resolves a song name to a video reference.
    ///
    /// Tries the literal name first, then up to `max_attempts` generated
    /// variations, pausing between attempts. Returns `None` when every
    /// attempt fails; search failures are logged, never propagated.
    #[tracing::instrument(skip(self), fields(song = %song_name))]
    pub async fn resolve(&self, song_name: &str) -> Option<MediaReference> {
        let mut queries = vec![song_name.to_string()];
        queries.extend(generate_search_variations(song_name));
        queries.truncate(1 + self.max_attempts);

        for (attempt, query) in queries.iter().enumerate() {
            if attempt > 0 {
                debug!(attempt, %query, "Retrying with query variation");
                tokio::time::sleep(self.retry_pause).await;
            }
            if let Some(media) = self.lookup(query, 0).await {
                info!(video_id = %media.video_id, source = %media.source, "Resolved song");
                return Some(media);
            }
        }

        warn!(attempts = queries.len(), "Song could not be resolved");
        None
    }

    /// Resolves an alternative candidate for a song that already failed once.
    ///
    /// `attempt` indexes into the variation list and also skips that many
    /// leading candidates, so consecutive calls walk progressively further
    /// from the original match.
    #[tracing::instrument(skip(self), fields(song = %song_name, attempt))]
    pub async fn resolve_alternate(
        &self,
        song_name: &str,
        attempt: usize,
    ) -> Option<MediaReference> {
        let variations = generate_search_variations(song_name);
        let query = variations.get(attempt)?;
        self.lookup(query, attempt).await
    }

    /// Single search pass: API first while quota remains, scrape otherwise.
    async fn lookup(&self, query: &str, skip: usize) -> Option<MediaReference> {
        if let Some(api) = &self.api
            && !self.quota.is_exhausted()
        {
            let outcome = api.search(query, skip).await;
            self.record_usage().await;
            match outcome {
                Ok(video_id) => {
                    return Some(MediaReference::new(video_id, SourceKind::PrimaryApi));
                }
                Err(e) if e.is_quota_exceeded() => {
                    info!("API quota exhausted; using scrape fallback from now on");
                    self.quota.mark_exhausted();
                }
                Err(e) => {
                    debug!(error = %e, "API search failed; trying scrape fallback");
                }
            }
        }

        let outcome = self.scrape.search(query, skip).await;
        self.record_usage().await;
        match outcome {
            Ok(video_id) => Some(MediaReference::new(video_id, SourceKind::FallbackScrape)),
            Err(e) => {
                debug!(error = %e, "Scrape search failed");
                None
            }
        }
    }

    /// Bumps the persistent search usage counter. Failures are logged and
    /// never block resolution.
    async fn record_usage(&self) {
        if let Some(usage) = &self.usage
            && let Err(e) = usage.record_search().await
        {
            warn!(error = %e, "Failed to record search usage");
        }
    }
}

impl std::fmt::Debug for TitleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleResolver")
            .field("api_configured", &self.api.is_some())
            .field("quota_exhausted", &self.quota.is_exhausted())
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
