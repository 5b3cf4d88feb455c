//! Text normalization and phrase matching
//!
//! All matching happens on folded text: lower-case, Spanish accents removed,
//! whitespace runs collapsed to one space. Scanned contracts mix accented and
//! unaccented spellings of the same heading, so folding both sides lets one
//! phrase cover every variant.

/// Fold text for matching
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        for lower in ch.to_lowercase() {
            out.push(strip_accent(lower));
        }
    }

    out
}

fn strip_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        other => other,
    }
}

/// True when `phrase` occurs in `haystack` on word boundaries.
///
/// Both arguments must already be folded. A match that starts or ends inside
/// a word does not count, so `rit` does not match `escrito`.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }

    haystack.match_indices(phrase).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
