//! Subprocess-driven audio download pipeline.
//!
//! This module turns resolved video references into mp3 files on disk via
//! an external `yt-dlp` process, with bounded concurrency and defensive
//! handling of age-restricted sources.
//!
//! # Features
//!
//! - Semaphore-bounded parallel extraction (1-10 concurrent subprocesses)
//! - Hard per-download timeout (5min by default)
//! - Restricted retry: one alternative candidate for age-restricted videos
//! - Filesystem-safe output names derived from song names, with `_N`
//!   suffixes for duplicates
//! - Best-effort duration probing via `ffprobe`
//!
//! # Example
//!
//! ```no_run
//! use songfetch_core::download::{AudioExtractor, DownloadScheduler};
//! use songfetch_core::progress::NullSink;
//! use songfetch_core::resolver::{ResolverConfig, TitleResolver};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = TitleResolver::new(ResolverConfig::default())?;
//! let scheduler = DownloadScheduler::new(3, AudioExtractor::new())?;
//! let batch = scheduler
//!     .run(Vec::new(), &resolver, Path::new("Audios"), &NullSink)
//!     .await?;
//! println!("{batch}");
//! # Ok(())
//! # }
//! ```

mod extractor;
mod filename;
mod outcome;
mod scheduler;

pub use extractor::AudioExtractor;
pub use filename::{clean_filename, unique_output_path};
pub use outcome::{BatchResult, DownloadOutcome};
pub use scheduler::{DEFAULT_CONCURRENCY, DownloadScheduler, SchedulerError};
