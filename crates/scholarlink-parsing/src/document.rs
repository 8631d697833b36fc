//! Title, abstract and arXiv stamp detection for converted (markdown-ish)
//! documents.

use once_cell::sync::Lazy;
use regex::Regex;
use scholarlink_core::doi::extract_arxiv_id;

use crate::text::squash_whitespace;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(#{1,6})\s+(.+?)\s*#*\s*$").unwrap());

/// `## Abstract`, `Abstract`, `ABSTRACT:` or `Abstract: text on the same line`.
static ABSTRACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*)?abstract(?:\*\*)?(?:[ \t]*[:.\-—][ \t]*(?P<inline>\S.*))?[ \t]*$",
    )
    .unwrap()
});

/// Lines longer than this are body text, not a title.
const MAX_TITLE_CHARS: usize = 300;

/// Leading lines searched for the document's own arXiv stamp.
const STAMP_LINES: usize = 20;

/// Title and abstract found at the top of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentHeader {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    /// `arXiv:2301.12345v2` near the top of the document.
    pub arxiv_id: Option<String>,
}

/// Detect the document title and abstract.
///
/// The title is the first level-1 heading, else the first heading of any
/// level, else the first non-blank line if it is short enough. The abstract
/// is the paragraph under an `Abstract` heading (or following `Abstract:` on
/// the same line), ending at the next blank line or heading. Only the first
/// lines are searched for an arXiv stamp, so identifiers cited in the body
/// are not mistaken for the document's own.
pub fn detect_header(text: &str) -> DocumentHeader {
    let top: Vec<&str> = text.lines().take(STAMP_LINES).collect();
    DocumentHeader {
        title: detect_title(text),
        abstract_text: detect_abstract(text),
        arxiv_id: extract_arxiv_id(&top.join("\n")),
    }
}

fn detect_title(text: &str) -> Option<String> {
    let headings: Vec<(usize, &str)> = text
        .lines()
        .filter_map(|line| {
            let caps = HEADING_RE.captures(line)?;
            Some((caps.get(1)?.as_str().len(), caps.get(2)?.as_str()))
        })
        .filter(|(_, title)| !title.eq_ignore_ascii_case("abstract"))
        .collect();

    let heading = headings
        .iter()
        .find(|(level, _)| *level == 1)
        .or_else(|| headings.first())
        .map(|(_, title)| (*title).to_string());

    heading
        .or_else(|| {
            text.lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .filter(|l| l.chars().count() <= MAX_TITLE_CHARS)
                .filter(|l| !ABSTRACT_RE.is_match(l))
                .map(str::to_string)
        })
        .map(|t| squash_whitespace(t.trim_matches('*')))
        .filter(|t| !t.is_empty())
}

fn detect_abstract(text: &str) -> Option<String> {
    let caps = ABSTRACT_RE.captures(text)?;
    let whole = caps.get(0)?;

    let mut lines: Vec<&str> = caps.name("inline").map(|m| m.as_str()).into_iter().collect();
    let mut following = text[whole.end()..].lines();
    // Remainder of the matched line.
    following.next();
    for line in following {
        if line.trim().is_empty() {
            if lines.is_empty() {
                continue;
            }
            break;
        }
        if HEADING_RE.is_match(line) {
            break;
        }
        lines.push(line);
    }

    let body = squash_whitespace(&lines.join(" "));
    (!body.is_empty()).then_some(body)
}
