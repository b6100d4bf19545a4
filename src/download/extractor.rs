//! Audio extraction via an external `yt-dlp` subprocess.
//!
//! Extraction shells out rather than reimplementing stream negotiation;
//! `yt-dlp` already tracks site changes upstream. The extractor enforces a
//! hard per-download timeout and classifies age-restriction refusals
//! separately so the scheduler can retry those with alternative candidates.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::outcome::DownloadOutcome;

/// Default extraction program.
const DEFAULT_PROGRAM: &str = "yt-dlp";

/// Default probe program for reading audio duration.
const DEFAULT_PROBE_PROGRAM: &str = "ffprobe";

/// Hard ceiling on a single extraction.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Ceiling on a duration probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Target bitrate passed to the extractor.
const AUDIO_QUALITY: &str = "192K";

/// Runs `yt-dlp` to produce an mp3 for a resolved video.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    program: String,
    probe_program: String,
    timeout: Duration,
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioExtractor {
    /// Creates an extractor using `yt-dlp` and `ffprobe` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            probe_program: DEFAULT_PROBE_PROGRAM.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the extraction and probe programs (for testing with stubs).
    #[must_use]
    pub fn with_programs(program: impl Into<String>, probe_program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            probe_program: probe_program.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-download timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extracts the audio of `url` to `output_path`.
    ///
    /// `output_path` must end in `.mp3`; the subprocess receives the stem
    /// with an extension template so it can transcode into place. Never
    /// errors: every failure mode folds into a [`DownloadOutcome`].
    #[instrument(skip(self), fields(url = %url, output = %output_path.display()))]
    pub async fn extract(&self, url: &str, output_path: &Path) -> DownloadOutcome {
        let template = output_path.with_extension("%(ext)s");

        let mut command = Command::new(&self.program);
        command
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg(AUDIO_QUALITY)
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&template)
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Spawning extraction subprocess");

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, program = %self.program, "Failed to spawn extractor");
                return DownloadOutcome::Failed(format!(
                    "could not run {}: {e}",
                    self.program
                ));
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Extraction timed out");
                return DownloadOutcome::Failed(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                ));
            }
        };

        if output.status.success() {
            let duration_secs = self.probe_duration(output_path).await;
            return DownloadOutcome::Success {
                local_path: output_path.to_path_buf(),
                duration_secs,
            };
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_age_restricted(&stderr) {
            debug!("Extraction refused: age-restricted source");
            return DownloadOutcome::Restricted;
        }

        let reason = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("extractor exited with an error")
            .trim()
            .to_string();
        warn!(%reason, "Extraction failed");
        DownloadOutcome::Failed(reason)
    }

    /// Best-effort duration probe. Any failure just yields `None`.
    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let mut command = Command::new(&self.probe_program);
        command
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(PROBE_TIMEOUT, command.output())
            .await
            .ok()?
            .ok()?;
        if !output.status.success() {
            return None;
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout).ok()?;
        probe.format?.duration?.parse().ok()
    }
}

/// Detects age-restriction refusals in extractor stderr.
fn is_age_restricted(stderr: &str) -> bool {
    let lowered = stderr.to_lowercase();
    lowered.contains("age-restricted") || lowered.contains("age restricted")
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}
