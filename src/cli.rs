//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use songfetch_core::DEFAULT_CONCURRENCY;

/// Download a numbered song list as mp3 files.
///
/// Songfetch parses a numbered song list, resolves each title to a video,
/// extracts audio via yt-dlp, and uploads the results to object storage
/// only when the entire batch succeeded.
#[derive(Parser, Debug)]
#[command(name = "songfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Song list (e.g. "1. Song A" "2. Song B"); reads stdin when omitted
    pub songs: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum concurrent downloads (1-10)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub concurrency: u8,

    /// Directory audio files are written to
    #[arg(short = 'o', long, default_value = "Audios")]
    pub output_dir: PathBuf,

    /// Storage bucket for committed batches
    #[arg(short = 'b', long, default_value = "songs")]
    pub bucket: String,

    /// Search API key (falls back to YOUTUBE_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Storage project base URL (falls back to SUPABASE_URL)
    #[arg(long)]
    pub storage_url: Option<String>,

    /// Storage API key (falls back to SUPABASE_KEY)
    #[arg(long)]
    pub storage_key: Option<String>,

    /// SQLite file tracking metered search usage
    #[arg(long, default_value = "songfetch.db")]
    pub usage_db: PathBuf,
}
