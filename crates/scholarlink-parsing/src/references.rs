//! Turning raw bibliography strings into structured [`Reference`]s.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scholarlink_core::authors::parse_author_name;
use scholarlink_core::doi::extract_doi;
use scholarlink_core::{Author, Reference};

use crate::config::ParsingConfig;

/// Parses one raw bibliography entry.
///
/// Implementations never fail: whatever cannot be recognized stays `None`
/// and the verbatim text is always kept in `raw_text`.
pub trait ReferenceParser: Send + Sync {
    fn parse(&self, raw: &str) -> Reference;

    fn parse_all(&self, raws: &[String]) -> Vec<Reference> {
        raws.iter().map(|raw| self.parse(raw)).collect()
    }
}

/// Regex-driven parser covering the common IEEE, ACM, APA, USENIX and
/// Springer layouts.
#[derive(Debug, Clone)]
pub struct HeuristicReferenceParser {
    max_authors: usize,
}

impl Default for HeuristicReferenceParser {
    fn default() -> Self {
        Self::new(&ParsingConfig::default())
    }
}

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// `———,` at the start: same authors as the previous entry.
static SAME_AUTHORS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\u{2014}\u{2013}\-]{2,}\s*[,.]").unwrap());

static QUOTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["\u{201c}\u{201d}]([^"\u{201c}\u{201d}]{4,})["\u{201c}\u{201d}]"#).unwrap()
});

/// `Authors (2020) Title` and APA `Authors (2020). Title`.
static PAREN_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\((\d{4})[a-z]?\)[.,:]?\s+").unwrap());

/// ACM `Authors. 2022. Title`.
static DOTTED_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\s*((?:19|20)\d{2})[a-z]?\.\s*").unwrap());

static ANY_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b((?:18|19|20)\d{2})[a-z]?\b").unwrap());

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://|\bdoi:|\b10\.\d{4,}/").unwrap());

static PERIOD_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s").unwrap());

static SENTENCE_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.?!]\s+").unwrap());

static TRAIL_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,;:\s]+$").unwrap());

static LEAD_IN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[\s,.;:]*(?:in:?\s+)?").unwrap());

/// Where a venue stops: volume, pages, issue, or a trailing year.
static VENUE_CUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i),\s*(?:vol\b|pp\b|\d)|\s+\d+\s*[:(]|\s*\(|\s+(?:18|19|20)\d{2}\b").unwrap()
});

static AAAI_CHECK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Lu}\p{Ll}+,\s+\p{Lu}\.").unwrap());

static AND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i),?\s+and\s+").unwrap());
static AMP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*&\s*").unwrap());
static ET_AL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i),?\s*et\s+al\.?").unwrap());

/// `J.`, `J. K.`, `JK`, `J.-P.`
static INITIALS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\p{Lu}\.?[\s\-]*)+$").unwrap());

static NAME_PARTICLES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["and", "de", "van", "von", "la", "del", "der", "di", "da", "du", "le"]
        .into_iter()
        .collect()
});

/// How the author list is delimited in one entry.
struct Layout {
    author_end: usize,
    body_start: usize,
    year: Option<i32>,
    quoted_title: Option<(String, usize)>,
}

impl HeuristicReferenceParser {
    pub fn new(config: &ParsingConfig) -> Self {
        Self {
            max_authors: config.max_authors,
        }
    }

    /// Parse and report whether the entry reuses the previous authors.
    fn parse_entry(&self, raw: &str) -> (Reference, bool) {
        let text = WS_RE.replace_all(raw.trim(), " ");
        let text = text.trim();
        let mut reference = Reference::new(raw.trim());

        reference.doi = extract_doi(text);

        let same_as_previous = SAME_AUTHORS_RE.is_match(text);
        let layout = layout(text);

        if !same_as_previous {
            let section = TRAIL_PUNCT_RE.replace(text[..layout.author_end].trim(), "");
            reference.authors = parse_authors(&section, self.max_authors);
        }

        reference.year = layout.year.or_else(|| {
            let searchable = LINK_RE.find(text).map_or(text, |m| &text[..m.start()]);
            ANY_YEAR_RE
                .captures_iter(searchable)
                .last()
                .and_then(|c| c.get(1)?.as_str().parse().ok())
        });

        let (title, venue) = match &layout.quoted_title {
            Some((title, quote_end)) => (Some(title.clone()), clean_venue(&text[*quote_end..])),
            None => title_and_venue(&text[layout.body_start..]),
        };
        reference.title = title;
        reference.venue = venue;

        tracing::debug!(
            authors = reference.authors.len(),
            year = ?reference.year,
            has_title = reference.title.is_some(),
            has_doi = reference.doi.is_some(),
            "parsed reference"
        );
        (reference, same_as_previous)
    }
}

impl ReferenceParser for HeuristicReferenceParser {
    fn parse(&self, raw: &str) -> Reference {
        self.parse_entry(raw).0
    }

    /// Entries opening with a dash run inherit the previous entry's authors.
    fn parse_all(&self, raws: &[String]) -> Vec<Reference> {
        let mut out: Vec<Reference> = Vec::with_capacity(raws.len());
        for raw in raws {
            let (mut reference, same_as_previous) = self.parse_entry(raw);
            if same_as_previous {
                if let Some(previous) = out.last() {
                    reference.authors = previous.authors.clone();
                }
            }
            out.push(reference);
        }
        out
    }
}

fn layout(text: &str) -> Layout {
    if let Some(caps) = QUOTED_RE.captures(text) {
        if let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) {
            let title = TRAIL_PUNCT_RE.replace(inner.as_str().trim(), "").to_string();
            return Layout {
                author_end: whole.start(),
                body_start: whole.end(),
                year: None,
                quoted_title: Some((title, whole.end())),
            };
        }
    }

    for (re, include_period) in [(&*PAREN_YEAR_RE, false), (&*DOTTED_YEAR_RE, true)] {
        if let Some(caps) = re.captures(text) {
            if let Some(whole) = caps.get(0) {
                return Layout {
                    author_end: whole.start() + usize::from(include_period),
                    body_start: whole.end(),
                    year: caps.get(1).and_then(|y| y.as_str().parse().ok()),
                    quoted_title: None,
                };
            }
        }
    }

    let end = find_first_real_period(text).unwrap_or(text.len());
    Layout {
        author_end: end,
        body_start: end,
        year: None,
        quoted_title: None,
    }
}

/// First period that does not follow an initial like `J.`.
fn find_first_real_period(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    PERIOD_SPACE_RE
        .find_iter(text)
        .map(|m| m.start())
        .find(|&pos| {
            let initial = pos >= 1
                && bytes[pos - 1].is_ascii_uppercase()
                && (pos == 1 || !bytes[pos - 2].is_ascii_alphabetic());
            pos > 0 && !initial
        })
}

/// First sentence of `body` as the title, the next one as the venue.
fn title_and_venue(body: &str) -> (Option<String>, Option<String>) {
    let body = body.trim_start_matches(|c: char| c.is_whitespace() || ".,;:".contains(c));
    if body.is_empty() {
        return (None, None);
    }
    let (title, rest) = match SENTENCE_END_RE.find(body) {
        Some(m) => {
            // Keep a closing question mark, drop a period.
            let end = if body[m.start()..].starts_with('?') { m.start() + 1 } else { m.start() };
            (&body[..end], &body[m.end()..])
        }
        None => (body, ""),
    };
    let title = TRAIL_PUNCT_RE.replace(title.trim(), "").to_string();
    let title = (!title.is_empty() && !LINK_RE.is_match(&title)).then_some(title);

    let venue_sentence = SENTENCE_END_RE
        .find(rest)
        .map_or(rest, |m| &rest[..m.start()]);
    (title, clean_venue(venue_sentence))
}

fn clean_venue(text: &str) -> Option<String> {
    let text = LEAD_IN_RE.replace(text, "");
    let text = match VENUE_CUT_RE.find(&text) {
        Some(m) => &text[..m.start()],
        None => &text[..],
    };
    let venue = TRAIL_PUNCT_RE.replace(text.trim(), "").to_string();
    let lower = venue.to_lowercase();
    if venue.is_empty() || LINK_RE.is_match(&venue) || lower.starts_with("doi") {
        return None;
    }
    Some(venue)
}

/// Split an author section into [`Author`]s.
fn parse_authors(section: &str, max_authors: usize) -> Vec<Author> {
    let section = section.trim();
    if section.is_empty() {
        return Vec::new();
    }
    let names = if section.contains("; ") && AAAI_CHECK_RE.is_match(section) {
        split_semicolon_authors(section)
    } else {
        split_comma_authors(section)
    };
    names
        .iter()
        .filter_map(|name| parse_author_name(name))
        .filter(Author::is_valid)
        .take(max_authors)
        .collect()
}

/// `Smith, J.; Jones, A.; and Williams, C.`
fn split_semicolon_authors(section: &str) -> Vec<String> {
    static SEMI_AND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i);\s+and\s+").unwrap());
    let section = SEMI_AND_RE.replace_all(section, "; ");
    section
        .split(';')
        .map(str::trim)
        .filter(|p| p.len() > 2 && p.chars().any(char::is_uppercase))
        .map(str::to_string)
        .collect()
}

/// Comma-separated names, with `Surname, I.` pairs rejoined.
fn split_comma_authors(section: &str) -> Vec<String> {
    let section = AND_RE.replace_all(section, ", ");
    let section = AMP_RE.replace_all(&section, ", ");
    let section = ET_AL_RE.replace_all(&section, "");

    let mut names: Vec<String> = Vec::new();
    let mut bare_surname = false;

    for part in section.split(',').map(str::trim) {
        if part.is_empty() {
            continue;
        }
        if INITIALS_RE.is_match(part) {
            if bare_surname {
                if let Some(last) = names.last_mut() {
                    last.push_str(", ");
                    last.push_str(part);
                }
            }
            bare_surname = false;
            continue;
        }
        if part.len() < 2 || part.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        let words: Vec<&str> = part.split_whitespace().collect();
        if words.len() > 5 {
            continue;
        }
        let lowercase_words = words
            .iter()
            .filter(|w| {
                w.chars().next().is_some_and(char::is_lowercase)
                    && !NAME_PARTICLES.contains(w.to_lowercase().as_str())
            })
            .count();
        if lowercase_words > 1 {
            continue;
        }
        if part.chars().any(char::is_uppercase) && part.chars().any(char::is_lowercase) {
            bare_surname = words.len() == 1;
            names.push(part.to_string());
        }
    }
    names
}
