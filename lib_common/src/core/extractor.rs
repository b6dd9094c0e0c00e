//! # Hashtag Extractor
//!
//! Pure, stateless token extraction. A hashtag is the `#` marker followed by one
//! or more letters, combining marks, decimal digits or connector punctuation (Unicode
//! aware). It must sit at the start of the text or right after whitespace, so
//! `a#b` and the second half of `#a#b` are not hashtags.

use regex::Regex;
use static_init::dynamic;

/// The character that opens every hashtag.
pub const HASHTAG_MARKER: char = '#';

// Compiled once on first use and shared by every caller.
#[dynamic]
static HASHTAG_PATTERN: Regex =
    Regex::new(r"(?:^|\s)(#[\p{L}\p{M}\p{Nd}\p{Pc}]+)").expect("hashtag pattern compiles");

/// Returns the hashtags of `text` in order of appearance.
///
/// The marker is kept, leading whitespace is not, and the case of the token is
/// preserved. Matches never overlap. The returned slices borrow from `text`.
pub fn extract_hashtags(text: &str) -> Vec<&str> {
    if !text.contains(HASHTAG_MARKER) {
        return Vec::new();
    }

    HASHTAG_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}
