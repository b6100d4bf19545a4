//! Search query variation generation for retry attempts.
//!
//! When the literal song name produces no usable match, the resolver retries
//! with progressively simplified or suffixed forms of the name. Variations
//! never include the original name and are deduplicated case-insensitively.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Suffixes appended to the base name, in priority order.
const QUERY_SUFFIXES: [&str; 5] = ["audio", "music", "song", "cover", "remix"];

/// Maximum number of variations returned for a single song name.
const MAX_VARIATIONS: usize = 5;

/// Decoration-stripping rules applied to the raw name, in priority order.
///
/// Each rule removes a common trailing decoration: a bare "official" tag,
/// an "by <artist>" attribution, or an "- <something> Version" qualifier.
fn strip_rules() -> &'static [Regex; 3] {
    static RULES: OnceLock<[Regex; 3]> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RULES.get_or_init(|| {
        [
            Regex::new(r"(?i)\s+official\s*$").unwrap(),
            Regex::new(r"(?i)\s+by\s+\S+.*$").unwrap(),
            Regex::new(r"(?i)\s+-\s+\S+\s+version.*$").unwrap(),
        ]
    })
}

/// Generates up to [`MAX_VARIATIONS`] alternative search queries for a song.
///
/// Stripped forms come first (more likely to match), then suffixed forms.
/// The original name itself is never included, and variations that differ
/// only in case are collapsed.
#[must_use]
pub fn generate_search_variations(song_name: &str) -> Vec<String> {
    let base = song_name.trim();
    let mut variations: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(base.to_lowercase());

    let mut push = |candidate: String, out: &mut Vec<String>, seen: &mut HashSet<String>| {
        let candidate = candidate.trim().to_string();
        if candidate.is_empty() {
            return;
        }
        if seen.insert(candidate.to_lowercase()) {
            out.push(candidate);
        }
    };

    for rule in strip_rules() {
        let stripped = rule.replace(base, "").trim().to_string();
        push(stripped, &mut variations, &mut seen);
    }

    for suffix in QUERY_SUFFIXES {
        push(format!("{base} {suffix}"), &mut variations, &mut seen);
    }

    variations.truncate(MAX_VARIATIONS);
    variations
}
