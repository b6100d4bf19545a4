//! Result types for audio extraction and batch runs.

use std::path::PathBuf;

use crate::parser::SongRequest;

/// Outcome of a single extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    /// The audio file was produced.
    Success {
        /// Where the file landed on disk.
        local_path: PathBuf,
        /// Probed duration in seconds, when ffprobe is available.
        duration_secs: Option<f64>,
    },
    /// The source refused extraction due to an age restriction.
    ///
    /// Handled separately from other failures because an alternative
    /// candidate for the same song is often unrestricted.
    Restricted,
    /// Extraction failed for any other reason.
    Failed(String),
}

impl DownloadOutcome {
    /// Returns true for [`DownloadOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Aggregated result of a download batch, ordered by song index.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Number of songs the batch set out to download.
    pub total_requested: usize,
    /// Songs that produced an audio file, with where it landed.
    pub succeeded: Vec<(SongRequest, PathBuf)>,
    /// Songs that did not, with the reason.
    pub failed: Vec<(SongRequest, String)>,
    /// Names of songs rescued by the restricted-retry path.
    pub retry_successes: Vec<String>,
}

impl BatchResult {
    /// Creates an empty result for a batch of `total_requested` songs.
    #[must_use]
    pub fn new(total_requested: usize) -> Self {
        Self {
            total_requested,
            ..Self::default()
        }
    }

    /// Returns true when every requested song succeeded.
    ///
    /// An empty batch is not complete; there is nothing to commit.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_requested > 0
            && self.failed.is_empty()
            && self.succeeded.len() == self.total_requested
    }

    /// Re-sorts both lists by the original song index.
    pub fn sort_by_index(&mut self) {
        self.succeeded.sort_by_key(|(song, _)| song.index);
        self.failed.sort_by_key(|(song, _)| song.index);
    }
}

impl std::fmt::Display for BatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed out of {}",
            self.succeeded.len(),
            self.failed.len(),
            self.total_requested
        )
    }
}
