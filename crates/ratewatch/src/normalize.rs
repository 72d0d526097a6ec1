//! Canonical keys for hotel names.
//!
//! Scraped titles and configured competitor names go through the same
//! [`normalize`] before they are compared, so matching ignores case,
//! diacritics and surrounding whitespace.

use deunicode::deunicode;

/// Maps a raw hotel name to its canonical comparison key.
///
/// Trims, lowercases and transliterates to ASCII. Total over any input and
/// idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    // transliteration can emit uppercase or padded output for some symbols
    deunicode(&lowered).to_ascii_lowercase().trim().to_string()
}

/// Human readable column label for a canonical key.
///
/// Every letter that follows a non-letter is uppercased, the rest are
/// lowercased. Only depends on its input, so one hotel always yields the
/// same label.
pub fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut prev_letter = false;
    for ch in key.chars() {
        if ch.is_alphabetic() {
            if prev_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(ch);
            prev_letter = false;
        }
    }
    out
}

/// Filename-safe form of a city name: `"São Paulo"` -> `"sao_paulo"`.
pub fn slug(raw: &str) -> String {
    normalize(raw)
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
