//! All-or-nothing commit gate for finished batches.
//!
//! Uploads happen only when every requested song in the batch produced an
//! audio file. A single failure anywhere in the batch keeps the whole batch
//! local: partial uploads would leave the stored collection silently
//! missing songs the user asked for. The gate is strict on entry only;
//! once committing, an individual upload failure is counted and skipped so
//! the rest of the batch still lands.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::download::{BatchResult, clean_filename};
use crate::storage::Uploader;

/// How many `_N` dedupe suffixes artifact lookup probes.
const MAX_SUFFIX_PROBES: usize = 10;

/// A successfully stored object.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    /// Object filename inside the bucket.
    pub filename: String,
    /// Public URL of the stored object.
    pub durable_url: String,
    /// Original 1-based song index, for ordered presentation.
    pub order: usize,
}

/// Outcome of a commit attempt.
#[derive(Debug, Default)]
pub struct CommitSummary {
    /// Whether the gate opened at all.
    pub attempted: bool,
    /// Objects stored durably.
    pub uploaded: usize,
    /// Uploads that failed after the gate opened.
    pub failed_uploads: usize,
    /// Records for stored objects, in song order with gaps omitted.
    pub references: Vec<UploadRecord>,
}

impl std::fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.attempted {
            return write!(f, "commit skipped");
        }
        write!(
            f,
            "{} uploaded, {} failed",
            self.uploaded, self.failed_uploads
        )
    }
}

/// Strict commit gate in front of object storage.
#[derive(Debug, Clone)]
pub struct CommitGate {
    bucket: String,
}

impl CommitGate {
    /// Creates a gate targeting `bucket`.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    /// Returns the target bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Commits a finished batch to storage.
    ///
    /// The gate opens only when the batch is complete (every requested song
    /// succeeded, and there was at least one) and an uploader is configured.
    /// Uploads run sequentially in song order. A missing or failed artifact
    /// is counted in `failed_uploads` and skipped.
    #[instrument(skip(self, batch, uploader), fields(bucket = %self.bucket, %batch))]
    pub async fn commit(
        &self,
        batch: &BatchResult,
        uploader: Option<&dyn Uploader>,
        audio_dir: &Path,
    ) -> CommitSummary {
        let mut summary = CommitSummary::default();

        if !batch.is_complete() {
            info!("batch incomplete; keeping all files local");
            return summary;
        }
        let Some(uploader) = uploader else {
            debug!("no uploader configured; keeping all files local");
            return summary;
        };

        summary.attempted = true;
        info!(songs = batch.succeeded.len(), "committing batch to storage");

        for (song, recorded_path) in &batch.succeeded {
            let Some(artifact) = locate_artifact(audio_dir, recorded_path, &song.raw_text) else {
                warn!(song = %song.raw_text, "audio artifact missing on disk");
                summary.failed_uploads += 1;
                continue;
            };

            match uploader.upload(&artifact, &self.bucket).await {
                Ok(durable_url) => {
                    let filename = artifact
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    debug!(%filename, "stored durably");
                    summary.references.push(UploadRecord {
                        filename,
                        durable_url,
                        order: song.index,
                    });
                    summary.uploaded += 1;
                }
                Err(e) => {
                    warn!(song = %song.raw_text, error = %e, "upload failed");
                    summary.failed_uploads += 1;
                }
            }
        }

        info!(%summary, "commit finished");
        summary
    }
}

/// Finds the on-disk artifact for a song.
///
/// The recorded path wins when it still exists. Otherwise the lookup
/// probes the sanitized name and its `_1` to `_10` dedupe suffixes.
fn locate_artifact(audio_dir: &Path, recorded_path: &Path, song_name: &str) -> Option<PathBuf> {
    if recorded_path.exists() {
        return Some(recorded_path.to_path_buf());
    }

    let stem = clean_filename(song_name);
    let plain = audio_dir.join(format!("{stem}.mp3"));
    if plain.exists() {
        return Some(plain);
    }
    for n in 1..=MAX_SUFFIX_PROBES {
        let candidate = audio_dir.join(format!("{stem}_{n}.mp3"));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
