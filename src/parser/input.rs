//! Types representing parsed song requests and parse results.

use std::fmt;

/// A single song extracted from a numbered list.
///
/// `index` is the 1-based ordinal position in the submitted batch, which
/// downstream phases use to restore request order after concurrent
/// downloads complete out of order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRequest {
    /// 1-based position in the original list.
    pub index: usize,
    /// Normalized song name (whitespace collapsed, trimmed).
    pub raw_text: String,
}

impl SongRequest {
    /// Creates a new song request.
    #[must_use]
    pub fn new(index: usize, raw_text: impl Into<String>) -> Self {
        Self {
            index,
            raw_text: raw_text.into(),
        }
    }
}

impl fmt::Display for SongRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.index, self.raw_text)
    }
}

/// Collection of song requests parsed from raw input.
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Successfully parsed songs, in list order.
    pub songs: Vec<SongRequest>,
    /// Lines that could not be parsed (for logging).
    pub skipped: Vec<String>,
}

impl ParseResult {
    /// Creates a new empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a song, assigning it the next 1-based index.
    pub fn add_song(&mut self, name: impl Into<String>) {
        let index = self.songs.len() + 1;
        self.songs.push(SongRequest::new(index, name));
    }

    /// Adds a skipped line (non-parseable).
    pub fn add_skipped(&mut self, line: impl Into<String>) {
        self.skipped.push(line.into());
    }

    /// Returns true if no songs were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Returns count of parsed songs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    /// Returns count of skipped lines.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Returns the song names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.songs.iter().map(|s| s.raw_text.as_str()).collect()
    }
}

impl fmt::Display for ParseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parsed {} songs ({} skipped)",
            self.songs.len(),
            self.skipped.len()
        )
    }
}
