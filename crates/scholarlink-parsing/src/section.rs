//! Locating the bibliography in converted document text and splitting it
//! into raw reference strings.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ParsingConfig;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\n\s*(?:#{1,6}\s*)?(?:References|Bibliography|Works\s+Cited)\s*\n").unwrap()
});

static END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\n\s*(?:#{1,6}\s*)?(?:Appendix|Acknowledgments|Acknowledgements|Supplementary|Ethics\s+Statement|Broader\s+Impact|Checklist)")
        .unwrap()
});

static IEEE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\[(\d+)\]\s*").unwrap());

static NUMBERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^|\n)\s*(\d+)\.\s+").unwrap());

static BLANK_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Pieces this short are page numbers or stray headings, not references.
const MIN_FALLBACK_LEN: usize = 20;

/// Byte span of the references section.
///
/// Returns the text between a `References`/`Bibliography`/`Works Cited`
/// header and the next end marker (Appendix, Acknowledgments, ...). Without
/// a header, the tail of the document after the configured tail fraction is used.
pub fn find_references_section<'a>(text: &'a str, config: &ParsingConfig) -> &'a str {
    let header_re = config.bibliography.heading.as_ref().unwrap_or(&HEADER_RE);
    let end_re = config.bibliography.end.as_ref().unwrap_or(&END_RE);

    if let Some(m) = header_re.find(text) {
        let rest = &text[m.end()..];
        let end = end_re.find(rest).map_or(rest.len(), |e| e.start());
        let section = &rest[..end];
        if !section.trim().is_empty() {
            return section;
        }
    }

    let cutoff = (text.len() as f64 * config.bibliography.tail_fraction.clamp(0.0, 1.0)) as usize;
    let cutoff = text
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| i >= cutoff)
        .unwrap_or(text.len());
    tracing::debug!(cutoff, "no references header, using document tail");
    &text[cutoff..]
}

/// Text before the references section header, or the whole text when
/// there is no header.
pub fn strip_references_section<'a>(text: &'a str, config: &ParsingConfig) -> &'a str {
    let header_re = config.bibliography.heading.as_ref().unwrap_or(&HEADER_RE);
    header_re.find(text).map_or(text, |m| &text[..m.start()])
}

/// Split a references section into raw reference strings.
///
/// Strategies, first match wins:
/// 1. bracketed markers `[1]`, `[2]`, ... (at least three)
/// 2. a numbered list `1.`, `2.`, ... starting at 1 and sequential
/// 3. blank-line separated blocks longer than 20 characters
pub fn segment_references(section: &str, config: &ParsingConfig) -> Vec<String> {
    if let Some(refs) = try_bracketed(section, config) {
        tracing::debug!(count = refs.len(), style = "bracketed", "segmented references");
        return refs;
    }
    if let Some(refs) = try_numbered(section, config) {
        tracing::debug!(count = refs.len(), style = "numbered", "segmented references");
        return refs;
    }
    let refs = fallback_blank_lines(section, config);
    tracing::debug!(count = refs.len(), style = "blank_line", "segmented references");
    refs
}

/// Split `text` at the given marker matches, keeping what follows each one.
fn split_at_markers(text: &str, markers: &[regex::Match<'_>]) -> Vec<String> {
    markers
        .iter()
        .enumerate()
        .filter_map(|(i, m)| {
            let end = markers.get(i + 1).map_or(text.len(), |next| next.start());
            let content = text[m.end()..end].trim();
            (!content.is_empty()).then(|| squash(content))
        })
        .collect()
}

fn squash(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn try_bracketed(section: &str, config: &ParsingConfig) -> Option<Vec<String>> {
    let re = config.bibliography.bracketed_entry.as_ref().unwrap_or(&IEEE_RE);
    // Leading newline so a marker on the very first line is found.
    let text = format!("\n{section}");
    let markers: Vec<_> = re.find_iter(&text).collect();
    if markers.len() < 3 {
        return None;
    }
    Some(split_at_markers(&text, &markers))
}

fn try_numbered(section: &str, config: &ParsingConfig) -> Option<Vec<String>> {
    let re = config.bibliography.numbered_entry.as_ref().unwrap_or(&NUMBERED_RE);
    let markers: Vec<_> = re.find_iter(section).collect();
    if markers.len() < 3 {
        return None;
    }

    let first_nums: Vec<u64> = re
        .captures_iter(section)
        .take(5)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect();
    if first_nums.first() != Some(&1) || !first_nums.windows(2).all(|w| w[1] == w[0] + 1) {
        return None;
    }

    Some(split_at_markers(section, &markers))
}

fn fallback_blank_lines(section: &str, config: &ParsingConfig) -> Vec<String> {
    let re = config.bibliography.entry_break.as_ref().unwrap_or(&BLANK_LINE_RE);
    re.split(section)
        .map(str::trim)
        .filter(|p| p.len() > MIN_FALLBACK_LEN)
        .map(squash)
        .collect()
}
