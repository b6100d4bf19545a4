//! Concurrent download scheduling with bounded parallelism.
//!
//! The scheduler fans resolved songs out to extraction subprocesses using a
//! semaphore-based concurrency limit, then collects outcomes in dispatch
//! order. Age-restricted refusals get a restricted retry: one re-download of
//! the first alternative candidate that resolves, and nothing more.
//!
//! # Concurrency Model
//!
//! - Each extraction runs in its own Tokio task
//! - A semaphore permit is acquired before spawning each task, so dispatch
//!   order matches list order even under contention
//! - Permits are released automatically when extractions complete (RAII)
//! - Restricted retries run on the collector side, sequentially

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::extractor::AudioExtractor;
use super::filename::{clean_filename, unique_output_path};
use super::outcome::{BatchResult, DownloadOutcome};
use crate::parser::SongRequest;
use crate::progress::ProgressSink;
use crate::resolver::{MediaReference, TitleResolver};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value. Extraction subprocesses are
/// CPU-and-bandwidth heavy, so the ceiling stays low.
const MAX_CONCURRENCY: usize = 10;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// How many alternative candidates a restricted retry may resolve.
const RESTRICTED_RETRY_ATTEMPTS: usize = 3;

/// Error type for scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Schedules extractions with bounded parallelism.
#[derive(Debug)]
pub struct DownloadScheduler {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    extractor: Arc<AudioExtractor>,
}

impl DownloadScheduler {
    /// Creates a scheduler with the specified concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConcurrency`] if the value is
    /// outside the valid range (1-10).
    pub fn new(concurrency: usize, extractor: AudioExtractor) -> Result<Self, SchedulerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(SchedulerError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, "creating download scheduler");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            extractor: Arc::new(extractor),
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every resolved song into `audio_dir`.
    ///
    /// Items are dispatched in list order; output filenames are claimed at
    /// dispatch time so concurrent extractions never race on a name.
    /// Individual failures do NOT error this method: they are folded into
    /// the returned [`BatchResult`].
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::OutputDir`] if the output directory cannot
    /// be created and [`SchedulerError::SemaphoreClosed`] if the semaphore
    /// is closed.
    #[instrument(skip(self, pairs, resolver, sink), fields(songs = pairs.len(), audio_dir = %audio_dir.display()))]
    pub async fn run(
        &self,
        pairs: Vec<(SongRequest, MediaReference)>,
        resolver: &TitleResolver,
        audio_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, SchedulerError> {
        let mut batch = BatchResult::new(pairs.len());

        tokio::fs::create_dir_all(audio_dir)
            .await
            .map_err(|source| SchedulerError::OutputDir {
                path: audio_dir.to_path_buf(),
                source,
            })?;

        info!("starting download batch");

        let mut taken = HashSet::new();
        let mut handles = Vec::with_capacity(pairs.len());

        for (song, media) in pairs {
            let stem = clean_filename(&song.raw_text);
            let output_path = unique_output_path(audio_dir, &stem, &mut taken);

            // Acquire before spawning so dispatch order follows list order.
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::SemaphoreClosed)?;

            sink.status(&format!("Downloading: {}", song.raw_text));

            let extractor = Arc::clone(&self.extractor);
            let task_song = song.clone();
            let handle = tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;
                let outcome = extractor.extract(&media.watch_url(), &output_path).await;
                (media, output_path, outcome)
            });
            handles.push((task_song, handle));
        }

        debug!(task_count = handles.len(), "waiting for extractions");

        for (song, handle) in handles {
            let (media, output_path, outcome) = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    // Task panics are logged but don't fail the batch; the
                    // song is counted as failed to keep totals consistent.
                    warn!(song = %song.raw_text, error = %e, "extraction task panicked");
                    batch.failed.push((song, "extraction task panicked".to_string()));
                    continue;
                }
            };

            match outcome {
                DownloadOutcome::Success { local_path, .. } => {
                    info!(song = %song.raw_text, path = %local_path.display(), "download completed");
                    sink.status(&format!("Downloaded: {}", song.raw_text));
                    batch.succeeded.push((song, local_path));
                }
                DownloadOutcome::Restricted => {
                    debug!(song = %song.raw_text, video_id = %media.video_id, "age-restricted; trying alternatives");
                    sink.status(&format!(
                        "Age-restricted, retrying with alternative: {}",
                        song.raw_text
                    ));
                    self.retry_restricted(song, &output_path, resolver, sink, &mut batch)
                        .await;
                }
                DownloadOutcome::Failed(reason) => {
                    warn!(song = %song.raw_text, %reason, "download failed");
                    sink.status(&format!("Failed: {} ({reason})", song.raw_text));
                    batch.failed.push((song, reason));
                }
            }
        }

        batch.sort_by_index();
        info!(%batch, "download batch complete");
        Ok(batch)
    }

    /// Restricted retry: resolve up to three alternative candidates, and
    /// give the first one found a single re-download. Its outcome is final
    /// either way.
    async fn retry_restricted(
        &self,
        song: SongRequest,
        output_path: &Path,
        resolver: &TitleResolver,
        sink: &dyn ProgressSink,
        batch: &mut BatchResult,
    ) {
        for attempt in 0..RESTRICTED_RETRY_ATTEMPTS {
            let Some(alternative) = resolver.resolve_alternate(&song.raw_text, attempt).await
            else {
                continue;
            };

            debug!(
                song = %song.raw_text,
                attempt,
                video_id = %alternative.video_id,
                "found alternative candidate"
            );

            let outcome = self
                .extractor
                .extract(&alternative.watch_url(), output_path)
                .await;

            if let DownloadOutcome::Success { local_path, .. } = outcome {
                info!(song = %song.raw_text, "alternative download succeeded");
                sink.status(&format!("Recovered via alternative: {}", song.raw_text));
                batch.retry_successes.push(song.raw_text.clone());
                batch.succeeded.push((song, local_path));
            } else {
                warn!(song = %song.raw_text, ?outcome, "alternative download failed");
                batch
                    .failed
                    .push((song, "age-restricted, alternative failed".to_string()));
            }
            return;
        }

        warn!(song = %song.raw_text, "no alternative candidate found");
        batch
            .failed
            .push((song, "age-restricted, no alternative found".to_string()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_new_valid_concurrency() {
        let scheduler = DownloadScheduler::new(1, AudioExtractor::new()).unwrap();
        assert_eq!(scheduler.concurrency(), 1);

        let scheduler = DownloadScheduler::new(DEFAULT_CONCURRENCY, AudioExtractor::new()).unwrap();
        assert_eq!(scheduler.concurrency(), 3);

        let scheduler = DownloadScheduler::new(10, AudioExtractor::new()).unwrap();
        assert_eq!(scheduler.concurrency(), 10);
    }

    #[test]
    fn test_scheduler_new_invalid_concurrency_zero() {
        let result = DownloadScheduler::new(0, AudioExtractor::new());
        assert!(matches!(
            result,
            Err(SchedulerError::InvalidConcurrency { value: 0 })
        ));
    }

    #[test]
    fn test_scheduler_new_invalid_concurrency_too_high() {
        let result = DownloadScheduler::new(11, AudioExtractor::new());
        assert!(matches!(
            result,
            Err(SchedulerError::InvalidConcurrency { value: 11 })
        ));
    }

    #[test]
    fn test_scheduler_error_display() {
        let error = SchedulerError::InvalidConcurrency { value: 0 };
        let msg = error.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains('0'));
    }

    #[cfg(unix)]
    mod batch {
        use super::*;
        use crate::progress::MemorySink;
        use crate::resolver::{ResolverConfig, SourceKind, TitleResolver};
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        const SUCCESS_BODY: &str = r#"
template=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then template="$arg"; fi
  prev="$arg"
done
out=$(printf '%s' "$template" | sed 's/%(ext)s/mp3/')
: > "$out"
exit 0
"#;

        fn offline_resolver() -> TitleResolver {
            // Points at a closed port so alternative resolution fails fast.
            TitleResolver::new(ResolverConfig {
                scrape_base_url: Some("http://127.0.0.1:9".to_string()),
                retry_pause: Some(Duration::ZERO),
                ..ResolverConfig::default()
            })
            .unwrap()
        }

        fn pair(index: usize, name: &str, id: &str) -> (SongRequest, MediaReference) {
            (
                SongRequest::new(index, name),
                MediaReference::new(id, SourceKind::FallbackScrape),
            )
        }

        #[tokio::test]
        async fn test_run_downloads_all_songs() {
            let dir = tempfile::tempdir().unwrap();
            let program = write_stub(dir.path(), "fake-dlp", SUCCESS_BODY);
            let probe = write_stub(dir.path(), "fake-probe", "exit 1");

            let extractor = AudioExtractor::with_programs(
                program.to_str().unwrap(),
                probe.to_str().unwrap(),
            );
            let scheduler = DownloadScheduler::new(2, extractor).unwrap();
            let resolver = offline_resolver();
            let sink = MemorySink::new();
            let audio_dir = dir.path().join("audio");

            let pairs = vec![
                pair(1, "Song A", "aaaaaaaaaaa"),
                pair(2, "Song B", "bbbbbbbbbbb"),
                pair(3, "Song C", "ccccccccccc"),
            ];
            let batch = scheduler
                .run(pairs, &resolver, &audio_dir, &sink)
                .await
                .unwrap();

            assert!(batch.is_complete());
            assert_eq!(batch.succeeded.len(), 3);
            assert!(audio_dir.join("Song A.mp3").exists());
            assert!(audio_dir.join("Song B.mp3").exists());
            assert!(audio_dir.join("Song C.mp3").exists());
        }

        #[tokio::test]
        async fn test_run_results_ordered_by_index_despite_completion_order() {
            let dir = tempfile::tempdir().unwrap();
            // Earlier songs sleep longer, so completion order is 3, 2, 1.
            let body = format!(
                r#"
case "$*" in
  *First*) sleep 0.6;;
  *Second*) sleep 0.3;;
esac
{SUCCESS_BODY}"#
            );
            let program = write_stub(dir.path(), "fake-dlp", &body);
            let probe = write_stub(dir.path(), "fake-probe", "exit 1");

            let extractor = AudioExtractor::with_programs(
                program.to_str().unwrap(),
                probe.to_str().unwrap(),
            );
            let scheduler = DownloadScheduler::new(3, extractor).unwrap();
            let resolver = offline_resolver();
            let sink = MemorySink::new();
            let audio_dir = dir.path().join("audio");

            let pairs = vec![
                pair(1, "First", "aaaaaaaaaaa"),
                pair(2, "Second", "bbbbbbbbbbb"),
                pair(3, "Third", "ccccccccccc"),
            ];
            let batch = scheduler
                .run(pairs, &resolver, &audio_dir, &sink)
                .await
                .unwrap();

            let indices: Vec<usize> = batch.succeeded.iter().map(|(s, _)| s.index).collect();
            assert_eq!(indices, vec![1, 2, 3]);
        }

        #[tokio::test]
        async fn test_run_duplicate_names_get_distinct_files() {
            let dir = tempfile::tempdir().unwrap();
            let program = write_stub(dir.path(), "fake-dlp", SUCCESS_BODY);
            let probe = write_stub(dir.path(), "fake-probe", "exit 1");

            let extractor = AudioExtractor::with_programs(
                program.to_str().unwrap(),
                probe.to_str().unwrap(),
            );
            let scheduler = DownloadScheduler::new(2, extractor).unwrap();
            let resolver = offline_resolver();
            let sink = MemorySink::new();
            let audio_dir = dir.path().join("audio");

            let pairs = vec![
                pair(1, "Same Song", "aaaaaaaaaaa"),
                pair(2, "Same Song", "bbbbbbbbbbb"),
            ];
            let batch = scheduler
                .run(pairs, &resolver, &audio_dir, &sink)
                .await
                .unwrap();

            assert!(batch.is_complete());
            assert!(audio_dir.join("Same Song.mp3").exists());
            assert!(audio_dir.join("Same Song_1.mp3").exists());
        }

        #[tokio::test]
        async fn test_run_mixed_outcomes_counted_separately() {
            let dir = tempfile::tempdir().unwrap();
            // Fails for one specific video, succeeds otherwise.
            let body = format!(
                r#"
case "$*" in
  *badbadbadba*) echo "ERROR: Video unavailable" >&2; exit 1 ;;
esac
{SUCCESS_BODY}"#
            );
            let program = write_stub(dir.path(), "fake-dlp", &body);
            let probe = write_stub(dir.path(), "fake-probe", "exit 1");

            let extractor = AudioExtractor::with_programs(
                program.to_str().unwrap(),
                probe.to_str().unwrap(),
            );
            let scheduler = DownloadScheduler::new(2, extractor).unwrap();
            let resolver = offline_resolver();
            let sink = MemorySink::new();
            let audio_dir = dir.path().join("audio");

            let pairs = vec![
                pair(1, "Good Song", "aaaaaaaaaaa"),
                pair(2, "Bad Song", "badbadbadba"),
            ];
            let batch = scheduler
                .run(pairs, &resolver, &audio_dir, &sink)
                .await
                .unwrap();

            assert!(!batch.is_complete());
            assert_eq!(batch.succeeded.len(), 1);
            assert_eq!(batch.failed.len(), 1);
            assert_eq!(batch.failed[0].0.raw_text, "Bad Song");
            assert!(batch.failed[0].1.contains("Video unavailable"));
        }

        #[tokio::test]
        async fn test_run_restricted_without_alternative_fails_song() {
            let dir = tempfile::tempdir().unwrap();
            let program = write_stub(
                dir.path(),
                "fake-dlp",
                r#"echo "ERROR: This video is age-restricted" >&2; exit 1"#,
            );
            let probe = write_stub(dir.path(), "fake-probe", "exit 1");

            let extractor = AudioExtractor::with_programs(
                program.to_str().unwrap(),
                probe.to_str().unwrap(),
            );
            let scheduler = DownloadScheduler::new(1, extractor).unwrap();
            // Offline resolver cannot produce an alternative candidate.
            let resolver = offline_resolver();
            let sink = MemorySink::new();
            let audio_dir = dir.path().join("audio");

            let pairs = vec![pair(1, "Restricted Song", "aaaaaaaaaaa")];
            let batch = scheduler
                .run(pairs, &resolver, &audio_dir, &sink)
                .await
                .unwrap();

            assert_eq!(batch.failed.len(), 1);
            assert!(batch.failed[0].1.contains("no alternative"));
            assert!(batch.retry_successes.is_empty());
        }
    }
}
