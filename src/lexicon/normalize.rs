//! Transcript text normalization
//!
//! Lowercases a transcript fragment, drops the punctuation marks STT
//! providers attach to partials, and splits on whitespace.

/// Marks removed before splitting. Removed, not replaced by whitespace,
/// so "don't" collapses to "dont". Hyphens are kept ("uh-huh").
pub const STRIPPED_PUNCTUATION: [char; 6] = [',', '.', '!', '?', '\'', '\u{2019}'];

/// Normalize a transcript fragment into lowercase tokens
pub fn normalize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .collect();

    cleaned.split_whitespace().map(str::to_owned).collect()
}
