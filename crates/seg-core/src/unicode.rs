//! Character folding shared by dictionary loading and lookup.

/// Lower-case a single character for trie keys.
///
/// Only single-char lowercase mappings are applied; characters whose lowercase
/// form expands to several chars (e.g. U+0130) are kept as-is so that one input
/// char always maps to one trie edge.
pub fn fold_char(c: char) -> char {
    if c.is_ascii() {
        return c.to_ascii_lowercase();
    }
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Fold a whole word, dropping surrounding whitespace.
pub fn fold_word(word: &str) -> Vec<char> {
    word.trim().chars().map(fold_char).collect()
}

/// Strip a leading UTF-8 byte-order mark.
pub fn strip_bom(line: &str) -> &str {
    line.strip_prefix('\u{FEFF}').unwrap_or(line)
}
