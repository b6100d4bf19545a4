//! Filesystem-safe filename derivation for extracted audio.
//!
//! Output names are derived from song names, not video titles, so the files
//! a user gets back line up with the list they submitted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Fallback stem used when sanitization removes every character.
const FALLBACK_STEM: &str = "audio";

/// Sanitizes a song name into a filesystem-safe file stem.
///
/// Keeps ASCII alphanumerics, spaces, dots, underscores, and hyphens;
/// everything else is removed. Runs of spaces collapse to one, and a name
/// that ends up empty falls back to `"audio"`.
#[must_use]
pub fn clean_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect();

    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        collapsed
    }
}

/// Derives a unique `.mp3` output path for `stem` inside `dir`.
///
/// `taken` holds the stems already claimed in this batch; colliding stems
/// get a `_1`, `_2`, ... suffix. Callers claim names sequentially at
/// dispatch time, before any file exists, so uniqueness is decided here
/// rather than by probing the filesystem.
#[must_use]
pub fn unique_output_path(dir: &Path, stem: &str, taken: &mut HashSet<String>) -> PathBuf {
    let chosen = if taken.insert(stem.to_string()) {
        stem.to_string()
    } else {
        let mut n = 1;
        loop {
            let candidate = format!("{stem}_{n}");
            if taken.insert(candidate.clone()) {
                break candidate;
            }
            n += 1;
        }
    };

    dir.join(format!("{chosen}.mp3"))
}
