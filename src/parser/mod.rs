//! Song-list parsing for raw numbered text input.
//!
//! Turns free-form numbered text ("1. Song A\n2. Song B", or the same list
//! concatenated on a single line without separators) into an ordered list of
//! normalized song names.
//!
//! # Example
//!
//! ```
//! use songfetch_core::parser::parse_song_list;
//!
//! let result = parse_song_list("1. Shape of You\n2. See You Again");
//! assert_eq!(result.names(), vec!["Shape of You", "See You Again"]);
//! ```

mod input;

pub use input::{ParseResult, SongRequest};

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

/// Detects "1. A2. B3. C" style input pasted without line breaks.
fn single_line_probe() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(r"\d+\.\s*\w").unwrap())
}

/// Segment marker for concatenated single-line input: "N." with no
/// word-boundary requirement, so "A2. B" splits after "A".
fn inline_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(r"\d+\.\s*").unwrap())
}

/// Segment marker for whole-buffer extraction: boundary-anchored "N."
/// so digits glued to a preceding word do not start a new segment.
fn bounded_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(r"\b\d+\.\s*").unwrap())
}

/// Strict per-line rule: the line must start with "N. content".
fn line_rule() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(r"^\s*\d+\.\s*(.+)$").unwrap())
}

/// Parses a raw numbered song list into ordered, normalized song names.
///
/// Strategy, in order:
/// 1. Single-line input with no line breaks ("1. A2. B") is split on the
///    next "N." marker or end of string.
/// 2. Otherwise a numbered-segment extraction runs over the whole buffer:
///    each boundary-anchored "N." marker owns the text up to the next
///    marker or end of input.
/// 3. If no segment survives, a strict per-line rule applies; lines that
///    do not start with "N. content" are dropped (recorded as skipped).
///
/// Names are whitespace-normalized; names that normalize to empty are
/// discarded. Empty input yields an empty result, not an error.
///
/// Known limitation: a digit-dot sequence inside a title ("3.5 Minutes")
/// is indistinguishable from a list marker. Segments that would start
/// with a digit are rejected by phases 1 and 2, which pushes such input
/// down to the per-line rule; a multi-line list keeps the full title,
/// while a single concatenated line containing one loses it. This mirrors
/// the established pipeline behavior and is deliberately not "fixed".
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
#[must_use]
pub fn parse_song_list(input: &str) -> ParseResult {
    let mut result = ParseResult::new();
    let buffer = input.trim();

    if buffer.is_empty() {
        debug!("Empty input provided");
        return result;
    }

    if !buffer.contains('\n') && single_line_probe().is_match(buffer) {
        for name in segment_by_markers(buffer, inline_marker()) {
            result.add_song(name);
        }
        if !result.is_empty() {
            info!(songs = result.len(), "Parsed single-line song list");
            return result;
        }
    }

    for name in segment_by_markers(buffer, bounded_marker()) {
        result.add_song(name);
    }

    if result.is_empty() {
        for raw_line in buffer.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            match line_rule().captures(line) {
                Some(caps) => {
                    let name = normalize_name(&caps[1]);
                    if !name.is_empty() {
                        result.add_song(name);
                    }
                }
                None => result.add_skipped(line),
            }
        }
    }

    info!(
        songs = result.len(),
        skipped = result.skipped_count(),
        "Parsing complete"
    );

    result
}

/// Collapses internal whitespace runs to single spaces and trims.
///
/// Idempotent: normalizing an already-normalized name is a no-op.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `buffer` into the text owned by each "N." marker.
///
/// A segment runs from the end of its marker to the start of the next
/// marker (or end of input). Segments that normalize to empty, or whose
/// first character is a digit (ambiguous marker remnants like "3.5"),
/// are discarded.
fn segment_by_markers(buffer: &str, marker: &Regex) -> Vec<String> {
    let spans: Vec<(usize, usize)> = marker
        .find_iter(buffer)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut names = Vec::new();
    for (i, (_, end)) in spans.iter().enumerate() {
        let stop = spans.get(i + 1).map_or(buffer.len(), |next| next.0);
        let name = normalize_name(&buffer[*end..stop]);
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        names.push(name);
    }
    names
}
