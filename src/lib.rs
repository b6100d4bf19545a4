//! Songfetch Core Library
//!
//! This library provides the core functionality for the songfetch tool,
//! which turns a numbered song list into a set of mp3 files, uploaded to
//! object storage only when the entire batch succeeded.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`parser`] - Numbered song-list parsing
//! - [`resolver`] - Search backends resolving names to video IDs
//! - [`download`] - Bounded-concurrency audio extraction via `yt-dlp`
//! - [`commit`] - All-or-nothing commit gate in front of storage
//! - [`storage`] - Object storage uploads
//! - [`batch`] - End-to-end pipeline orchestration
//! - [`progress`] - Status reporting seam for front-ends
//! - [`db`] - Search usage persistence

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod commit;
pub mod db;
pub mod download;
pub mod parser;
pub mod progress;
pub mod resolver;
pub mod storage;

// Re-export commonly used types
pub use batch::{BatchContext, BatchGuard, BatchOutcome, run_batch};
pub use commit::{CommitGate, CommitSummary, UploadRecord};
pub use db::{DbError, UsageCounter};
pub use download::{
    AudioExtractor, BatchResult, DEFAULT_CONCURRENCY, DownloadOutcome, DownloadScheduler,
    SchedulerError, clean_filename,
};
pub use parser::{ParseResult, SongRequest, parse_song_list};
pub use progress::{MemorySink, NullSink, ProgressSink, TracingSink};
pub use resolver::{MediaReference, ResolverConfig, SearchError, SourceKind, TitleResolver};
pub use storage::{ObjectStorage, UploadError, Uploader};
