//! Normalization of the free-text "owned characters" input.

/// Split a comma-separated list of character names: trim each piece, drop
/// empty pieces, preserve order. Duplicates pass through untouched; the
/// inference service tolerates them.
pub fn split_owned_characters(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}
