//! Text normalization for pattern matching.

/// Maximum number of characters considered during normalization. Bounds the
/// cost of matching against pathological pages.
pub const TEXT_LIMIT: usize = 100_000;

/// Canonicalize text for comparison: lowercase, replace every character
/// outside `[a-z0-9]` with a space, collapse whitespace runs, trim.
///
/// Applied to both page content and search terms, so matching is
/// case-insensitive and robust to punctuation and whitespace variance.
/// Pure and idempotent.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(TEXT_LIMIT));
    let mut pending_space = false;

    for ch in text.chars().take(TEXT_LIMIT) {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            out.push(ch);
            pending_space = false;
        } else {
            pending_space = true;
        }
    }

    out
}
