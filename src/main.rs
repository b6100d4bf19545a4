//! CLI entry point for the songfetch tool.

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use songfetch_core::{
    AudioExtractor, BatchContext, BatchGuard, BatchOutcome, CommitGate, DownloadScheduler,
    NullSink, ObjectStorage, ProgressSink, ResolverConfig, TitleResolver, Uploader, UsageCounter,
    batch::DEFAULT_SONG_PAUSE, run_batch,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

/// Progress sink backed by an indicatif spinner.
struct SpinnerSink {
    bar: ProgressBar,
}

impl SpinnerSink {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for SpinnerSink {
    fn status(&self, line: &str) {
        self.bar.set_message(line.to_string());
    }
}

fn flag_or_env(flag: Option<String>, var: &str) -> Option<String> {
    flag.or_else(|| std::env::var(var).ok())
        .filter(|value| !value.trim().is_empty())
}

/// Maps a batch outcome to the process exit code: nonzero when any song
/// in a completed batch failed.
fn exit_code(outcome: &BatchOutcome) -> u8 {
    match outcome {
        BatchOutcome::Completed { batch, .. } if !batch.failed.is_empty() => 1,
        _ => 0,
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Songfetch starting");

    // Read input: from positional args or stdin
    let input_text = if args.songs.is_empty() {
        if io::stdin().is_terminal() {
            info!("No input provided. Pipe a song list via stdin or pass it as arguments.");
            info!("Example: songfetch '1. Shape of You' '2. See You Again'");
            return Ok(ExitCode::SUCCESS);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        args.songs.join("\n")
    };

    // Usage tracking is advisory; a broken database file must not stop a run.
    let usage = match UsageCounter::new(&args.usage_db).await {
        Ok(counter) => Some(counter),
        Err(e) => {
            warn!(error = %e, "Search usage tracking unavailable");
            None
        }
    };

    let resolver = TitleResolver::new(ResolverConfig {
        api_key: flag_or_env(args.api_key, "YOUTUBE_API_KEY"),
        usage: usage.clone().map(Arc::new),
        ..ResolverConfig::default()
    })?;

    let scheduler = DownloadScheduler::new(usize::from(args.concurrency), AudioExtractor::new())?;

    let uploader: Option<Arc<dyn Uploader>> = match (
        flag_or_env(args.storage_url, "SUPABASE_URL"),
        flag_or_env(args.storage_key, "SUPABASE_KEY"),
    ) {
        (Some(url), Some(key)) => Some(Arc::new(ObjectStorage::new(url, key)?)),
        _ => {
            info!("No storage configured; batches will stay local");
            None
        }
    };

    let spinner = if args.quiet { None } else { Some(Arc::new(SpinnerSink::new())) };
    let sink: Arc<dyn ProgressSink> = match &spinner {
        Some(spinner) => Arc::clone(spinner) as Arc<dyn ProgressSink>,
        None => Arc::new(NullSink),
    };

    let ctx = BatchContext {
        resolver,
        scheduler,
        gate: CommitGate::new(&args.bucket),
        uploader,
        sink,
        guard: Arc::new(BatchGuard::new()),
        audio_dir: args.output_dir,
        song_pause: DEFAULT_SONG_PAUSE,
    };

    let outcome = run_batch(&input_text, &ctx).await?;

    if let Some(spinner) = &spinner {
        spinner.finish();
    }

    let code = exit_code(&outcome);

    match outcome {
        BatchOutcome::NothingToDo => {
            info!("No songs found in the input");
        }
        BatchOutcome::Busy => {
            warn!("Another batch is already running");
        }
        BatchOutcome::Completed { batch, commit } => {
            info!(
                requested = batch.total_requested,
                succeeded = batch.succeeded.len(),
                failed = batch.failed.len(),
                "Batch finished"
            );
            for name in &batch.retry_successes {
                info!(song = %name, "Recovered via alternative candidate");
            }
            for (song, reason) in &batch.failed {
                warn!(song = %song.raw_text, %reason, "Song failed");
            }
            if commit.attempted {
                info!(
                    uploaded = commit.uploaded,
                    failed_uploads = commit.failed_uploads,
                    "Batch committed to storage"
                );
                for record in &commit.references {
                    info!(order = record.order, url = %record.durable_url, "Stored");
                }
            } else if batch.is_complete() {
                info!("Batch complete; files kept local (no storage configured)");
            } else {
                warn!("Batch incomplete; nothing was uploaded");
            }
        }
    }

    // Flush the shared pool before the process winds down.
    if let Some(counter) = usage {
        counter.close().await;
    }

    Ok(ExitCode::from(code))
}
