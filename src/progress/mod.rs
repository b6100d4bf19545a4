//! Progress reporting seam between the pipeline and its front-end.
//!
//! The pipeline reports human-readable status lines through a
//! [`ProgressSink`] so library code never writes to a terminal directly.
//! The CLI installs an indicatif-backed sink; tests use [`MemorySink`].

use std::sync::Mutex;

use tracing::info;

/// Receives status lines from the pipeline.
///
/// Implementations must not block: a slow sink would stall download
/// collection.
pub trait ProgressSink: Send + Sync {
    /// Reports a single status line.
    fn status(&self, line: &str);
}

/// Sink that forwards status lines to the tracing subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn status(&self, line: &str) {
        info!("{line}");
    }
}

/// Sink that drops every status line.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn status(&self, _line: &str) {}
}

/// Sink that retains status lines in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every line received so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for MemorySink {
    fn status(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
