//! End-to-end batch orchestration: parse, resolve, download, commit.
//!
//! [`run_batch`] is the single entry point the CLI drives. It holds the
//! whole pipeline contract: resolution is serial and paced, downloads are
//! concurrent, and the commit gate decides at the end whether anything
//! leaves the machine.
//!
//! At most one batch runs at a time per process, enforced by
//! [`BatchGuard`]; a second invocation while one is active reports busy
//! instead of interleaving downloads.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::commit::{CommitGate, CommitSummary};
use crate::download::{BatchResult, DownloadScheduler, SchedulerError};
use crate::parser::parse_song_list;
use crate::progress::ProgressSink;
use crate::resolver::TitleResolver;
use crate::storage::Uploader;

/// Pause between consecutive song resolutions, to space out search traffic.
pub const DEFAULT_SONG_PAUSE: Duration = Duration::from_secs(2);

/// Errors that abort a batch before any per-song accounting exists.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The download scheduler could not run at all.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// One-at-a-time batch admission.
///
/// The flag transition uses compare-exchange so two concurrent callers
/// cannot both acquire; the permit releases on drop.
#[derive(Debug, Default)]
pub struct BatchGuard {
    active: AtomicBool,
}

impl BatchGuard {
    /// Creates an idle guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to begin a batch. Returns `None` while another is active.
    #[must_use]
    pub fn try_begin(&self) -> Option<BatchPermit<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BatchPermit { guard: self })
    }
}

/// RAII permit for an active batch.
#[derive(Debug)]
pub struct BatchPermit<'a> {
    guard: &'a BatchGuard,
}

impl Drop for BatchPermit<'_> {
    fn drop(&mut self) {
        self.guard.active.store(false, Ordering::Release);
    }
}

/// Everything a batch run needs, assembled once by the caller.
pub struct BatchContext {
    /// Title resolution pipeline.
    pub resolver: TitleResolver,
    /// Bounded-concurrency download scheduler.
    pub scheduler: DownloadScheduler,
    /// All-or-nothing commit gate.
    pub gate: CommitGate,
    /// Storage backend; `None` keeps every batch local.
    pub uploader: Option<Arc<dyn Uploader>>,
    /// Status line receiver.
    pub sink: Arc<dyn ProgressSink>,
    /// Batch admission guard.
    pub guard: Arc<BatchGuard>,
    /// Directory audio files land in.
    pub audio_dir: PathBuf,
    /// Pause between song resolutions. Zero in tests.
    pub song_pause: Duration,
}

/// Outcome of a batch invocation.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The input parsed to zero songs.
    NothingToDo,
    /// Another batch was already running.
    Busy,
    /// The pipeline ran to the end.
    Completed {
        /// Per-song download accounting.
        batch: BatchResult,
        /// What the commit gate did.
        commit: CommitSummary,
    },
}

/// Runs the full pipeline over a raw song list.
///
/// Songs that fail resolution are folded into the batch as failures, so
/// `total_requested` always equals the parsed song count and the commit
/// gate sees them. Individual song failures never escape as errors.
///
/// # Errors
///
/// Returns [`BatchError`] only for environment-level failures, such as an
/// output directory that cannot be created.
#[instrument(skip(raw_input, ctx), fields(input_len = raw_input.len()))]
pub async fn run_batch(raw_input: &str, ctx: &BatchContext) -> Result<BatchOutcome, BatchError> {
    let Some(_permit) = ctx.guard.try_begin() else {
        warn!("a batch is already running; refusing to start another");
        ctx.sink.status("A download batch is already running");
        return Ok(BatchOutcome::Busy);
    };

    let parsed = parse_song_list(raw_input);
    if parsed.is_empty() {
        info!("nothing to do: no songs parsed");
        ctx.sink.status("No songs found in the input");
        return Ok(BatchOutcome::NothingToDo);
    }

    let total = parsed.len();
    ctx.sink.status(&format!("Found {total} songs"));

    let mut pairs = Vec::new();
    let mut unresolved = Vec::new();

    for (i, song) in parsed.songs.into_iter().enumerate() {
        if i > 0 && !ctx.song_pause.is_zero() {
            tokio::time::sleep(ctx.song_pause).await;
        }
        ctx.sink.status(&format!("Searching: {}", song.raw_text));

        match ctx.resolver.resolve(&song.raw_text).await {
            Some(media) => pairs.push((song, media)),
            None => {
                ctx.sink
                    .status(&format!("Not found: {}", song.raw_text));
                unresolved.push((song, "no search result found".to_string()));
            }
        }
    }

    let mut batch = ctx
        .scheduler
        .run(pairs, &ctx.resolver, &ctx.audio_dir, ctx.sink.as_ref())
        .await?;

    // Unresolved songs count against the batch total like any failure.
    batch.total_requested = total;
    batch.failed.extend(unresolved);
    batch.sort_by_index();

    let commit = ctx
        .gate
        .commit(&batch, ctx.uploader.as_deref(), &ctx.audio_dir)
        .await;

    if commit.attempted {
        ctx.sink.status(&format!(
            "Uploaded {} of {} files",
            commit.uploaded,
            batch.succeeded.len()
        ));
    } else if batch.is_complete() {
        ctx.sink.status("All files kept local (no storage configured)");
    } else {
        ctx.sink.status(&format!(
            "Batch incomplete ({batch}); nothing uploaded"
        ));
    }

    Ok(BatchOutcome::Completed { batch, commit })
}
