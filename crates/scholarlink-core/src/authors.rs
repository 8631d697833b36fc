use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::model::Author;

/// Common surname prefixes (case-insensitive).
static SURNAME_PREFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "van", "von", "de", "del", "della", "di", "da", "al", "el", "la", "le", "ben", "ibn",
        "mac", "mc", "o",
    ]
    .into_iter()
    .collect()
});

/// Name suffixes to strip.
static NAME_SUFFIXES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["jr", "sr", "ii", "iii", "iv", "v"].into_iter().collect());

/// Split a display name into `(first_name, last_name)`.
///
/// The last whitespace-separated token is the last name; everything before
/// it is the first name. A single token yields a last name only and an empty
/// string yields neither.
pub fn split_full_name(full_name: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => (None, None),
        [only] => (None, Some((*only).to_string())),
        [first @ .., last] => (Some(first.join(" ")), Some((*last).to_string())),
    }
}

fn is_suffix(part: &str) -> bool {
    NAME_SUFFIXES.contains(part.to_lowercase().trim_end_matches('.'))
}

fn is_prefix(part: &str) -> bool {
    SURNAME_PREFIXES.contains(part.to_lowercase().trim_end_matches('.'))
}

/// Index where the surname begins, handling multi-word surnames
/// like "Van Bavel" or "De La Cruz".
fn surname_start(parts: &[&str]) -> usize {
    let n = parts.len();
    if n >= 3 && is_prefix(parts[n - 3]) {
        return n - 3;
    }
    if n >= 2 && is_prefix(parts[n - 2]) {
        return n - 2;
    }
    n.saturating_sub(1)
}

/// Parse an author name as it appears in a bibliography entry.
///
/// Handles:
/// - `Surname, Given` (AAAI/APA)
/// - `Surname I` (Springer: trailing 1-2 uppercase letters are initials)
/// - `Given [prefix] Surname [suffix]`
///
/// Returns `None` when nothing name-like remains.
pub fn parse_author_name(raw: &str) -> Option<Author> {
    let name = raw.trim().trim_end_matches([',', ';']).trim();
    if name.is_empty() {
        return None;
    }

    if let Some((surname, given)) = name.split_once(',') {
        let surname = surname.trim();
        let given = given.trim();
        if surname.is_empty() {
            return None;
        }
        if given.is_empty() || is_suffix(given) {
            return Some(Author::from_parts("", surname));
        }
        return Some(Author::from_parts(given, surname));
    }

    let mut parts: Vec<&str> = name.split_whitespace().collect();
    while parts.len() >= 2 && parts.last().is_some_and(|p| is_suffix(p)) {
        parts.pop();
    }

    if parts.len() >= 2 {
        let last = parts[parts.len() - 1];
        if last.len() <= 2 && last.chars().all(|c| c.is_uppercase()) {
            let surname = parts[..parts.len() - 1].join(" ");
            return Some(Author::from_parts(last, &surname));
        }
    }

    let start = surname_start(&parts);
    let surname = parts[start..].join(" ");
    let given = parts[..start].join(" ");
    Some(Author::from_parts(&given, &surname))
}

/// Surname spellings an in-text citation might use for this author.
///
/// The first entry is the full surname; for multi-word surnames the final
/// word is included as well ("Van Bavel" is also cited as "Bavel").
pub fn surname_variants(author: &Author) -> Vec<String> {
    let Some(surname) = author.surname() else {
        return Vec::new();
    };
    let mut variants = vec![surname.to_string()];
    let words: Vec<&str> = surname.split_whitespace().collect();
    if words.len() > 1 {
        if let Some(last) = words.last() {
            variants.push((*last).to_string());
        }
    }
    variants
}
