//! Text folding and cleanup shared by the pipeline stages.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold text for comparison: strip diacritics, lowercase, collapse whitespace.
pub fn fold(text: &str) -> String {
    let stripped: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    collapse_whitespace(&stripped)
}

/// Replace control characters and non-breaking spaces with spaces, collapse
/// whitespace runs, and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c.is_control() || c == '\u{00a0}')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical text form: NFC with collapsed whitespace.
pub fn clean(text: &str) -> String {
    let composed: String = text.nfc().collect();
    collapse_whitespace(&composed)
}

/// Strip diacritics and drop whatever is still outside ASCII.
pub fn ascii_fold(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii)
        .collect();
    collapse_whitespace(&folded)
}

/// True when the text reads like a column label: it has letters and no digits.
pub fn is_label(text: &str) -> bool {
    text.chars().any(char::is_alphabetic) && !text.chars().any(|c| c.is_ascii_digit())
}
