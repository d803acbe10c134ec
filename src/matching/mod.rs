//! Artist name normalization and matching.
//!
//! Catalogs disagree on casing, diacritics and punctuation for the same
//! artist, so cross-catalog lookups compare normalized forms.

use unicode_normalization::UnicodeNormalization;

/// Normalize a name for comparison: lowercase, decompose and strip combining
/// marks (so "Beyoncé" and "beyonce" agree), drop everything that is not
/// alphanumeric or a space, and trim.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Whether two names refer to the same artist after normalization.
pub fn names_match(a: &str, b: &str) -> bool {
    let a = normalize(a);
    !a.is_empty() && a == normalize(b)
}

/// Pick the candidate whose name normalizes to the same string as the
/// target; when none does, fall back to the first candidate.
///
/// The fallback trades precision for coverage: a similarly named but
/// unrelated artist can be picked when the catalog has no exact match.
pub fn find_best_match<'a, T>(
    target: &str,
    candidates: &'a [T],
    name_of: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    if candidates.is_empty() {
        return None;
    }
    candidates
        .iter()
        .find(|c| names_match(target, name_of(c)))
        .or_else(|| candidates.first())
}
