//! Phrase text normalization
//!
//! Stored phrases and duplicate comparisons both run through the same
//! normalization: whitespace runs collapse to single spaces, ends are
//! trimmed. Duplicate detection additionally case-folds. Matching is
//! exact after normalization, with no fuzzy or linguistic processing.

/// Collapse all whitespace runs to single spaces and trim the ends.
///
/// Pure and total: never fails, `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(phrase: &str) -> String {
    phrase.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison form used for duplicate detection: normalized + case-folded.
pub fn normalized_key(phrase: &str) -> String {
    normalize(phrase).to_lowercase()
}
