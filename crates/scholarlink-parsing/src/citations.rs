//! In-text citation detection and linking.
//!
//! Each paragraph is scanned left to right. At every step the earliest
//! match of any pattern family wins; at equal start positions the family
//! order is numeric, author-year, cross-reference. Scanning resumes after
//! the accepted match.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scholarlink_core::{
    CitationLink, CitationLocation, CitationSettings, CitationType, Reference,
};

use crate::config::ParsingConfig;
use crate::graph::CitationGraph;
use crate::resolve::resolve_author_year;
use crate::text::{char_offset, context_window, split_paragraphs};

/// `[1]`, `[1, 2]`, `[1-3]`, `[1–3, 5]`.
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*\d+(?:\s*[-–]\s*\d+)?(?:\s*[,;]\s*\d+(?:\s*[-–]\s*\d+)?)*\s*\]").unwrap()
});

static NUMERIC_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(?:\s*[-–]\s*(\d+))?").unwrap());

const SURNAME: &str = r"\p{Lu}[\p{L}'’\-]+";

/// `Smith (2020)`, `Smith et al. (2020a)`, `Jones and Brown (2022)`.
static NARRATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?P<surname>{SURNAME})(?:\s+et\s+al\.?|\s+(?:and|&)\s+{SURNAME})?,?\s+\((?P<year>\d{{4}})[a-z]?\)"
    ))
    .unwrap()
});

/// `(Smith, 2020)`, `(Smith et al., 2020)`, `(Jones & Brown, 2022)`.
static PARENTHETICAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\((?P<surname>{SURNAME})(?:\s+et\s+al\.?|\s+(?:and|&)\s+{SURNAME})?,\s*(?P<year>\d{{4}})[a-z]?\)"
    ))
    .unwrap()
});

/// `cf. Smith et al. (2020)`.
static CROSS_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b[Cc]f\.\s+(?P<surname>{SURNAME})(?:\s+et\s+al\.?|\s+(?:and|&)\s+{SURNAME})?,?\s+\((?P<year>\d{{4}})[a-z]?\)"
    ))
    .unwrap()
});

/// Capitalized words that precede a parenthesized year without being a surname.
const NOT_SURNAMES: &[&str] = &[
    "In", "The", "See", "This", "That", "These", "Those", "And", "Or", "For", "From", "With",
    "By", "On", "At", "As", "Is", "Since", "Until", "Before", "After", "During", "Figure",
    "Table", "Section", "Chapter", "Eq", "Equation",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Family {
    Numeric,
    Narrative,
    Parenthetical,
    CrossReference,
}

struct Found<'t> {
    family: Family,
    caps: Captures<'t>,
}

impl Found<'_> {
    fn start(&self) -> usize {
        self.caps.get(0).map_or(usize::MAX, |m| m.start())
    }

    fn end(&self) -> usize {
        self.caps.get(0).map_or(usize::MAX, |m| m.end())
    }
}

/// Count and list of citations that did not resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationValidation {
    pub total: usize,
    pub unresolved: Vec<CitationLink>,
}

impl CitationValidation {
    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }

    pub fn all_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Finds citations in document text and links them to the document's
/// ordered reference list.
#[derive(Debug, Clone)]
pub struct CitationProcessor {
    references: Vec<Reference>,
    settings: CitationSettings,
    links: Vec<CitationLink>,
}

impl CitationProcessor {
    pub fn new(references: Vec<Reference>, config: &ParsingConfig) -> Self {
        Self {
            references,
            settings: config.citations.clone(),
            links: Vec::new(),
        }
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Scan `text` and replace the current links with what was found.
    ///
    /// Text without citations yields an empty slice. Unresolvable
    /// citations are kept with `reference: None`.
    pub fn process_citations(&mut self, text: &str) -> &[CitationLink] {
        let mut links = Vec::new();
        for paragraph in split_paragraphs(text) {
            self.scan_paragraph(paragraph.index, paragraph.text, &mut links);
        }
        tracing::debug!(
            found = links.len(),
            unresolved = links.iter().filter(|l| !l.is_resolved()).count(),
            "processed citations"
        );
        self.links = links;
        &self.links
    }

    pub fn citation_links(&self) -> &[CitationLink] {
        &self.links
    }

    /// Citation graph over the current links, rooted at the document.
    pub fn get_citation_graph(&self) -> CitationGraph {
        CitationGraph::build(
            &self.links,
            &self.references,
            self.settings.context_window,
            true,
        )
    }

    pub fn validate_citations(&self) -> CitationValidation {
        CitationValidation {
            total: self.links.len(),
            unresolved: self
                .links
                .iter()
                .filter(|l| !l.is_resolved())
                .cloned()
                .collect(),
        }
    }

    pub fn into_references(self) -> Vec<Reference> {
        self.references
    }

    /// Hand back references and links, e.g. for the metadata builder.
    pub fn into_parts(self) -> (Vec<Reference>, Vec<CitationLink>) {
        (self.references, self.links)
    }

    fn scan_paragraph(&self, index: usize, text: &str, links: &mut Vec<CitationLink>) {
        let mut pos = 0;
        while let Some(found) = next_match(text, pos) {
            let (start, end) = (found.start(), found.end());
            let location = CitationLocation {
                paragraph: index,
                offset: char_offset(text, start),
            };
            let context = context_window(text, start, end, self.settings.context_window);
            let citation_text = &text[start..end];

            let make = |citation_type, reference| CitationLink {
                citation_text: citation_text.to_string(),
                citation_type,
                reference,
                context: context.to_string(),
                location,
            };

            match found.family {
                Family::Numeric => {
                    for reference in self.resolve_numeric(citation_text) {
                        links.push(make(CitationType::Numeric, reference));
                    }
                }
                Family::Narrative | Family::Parenthetical => {
                    links.push(make(CitationType::AuthorYear, self.resolve_named(&found.caps)));
                }
                Family::CrossReference => {
                    links.push(make(
                        CitationType::CrossReference,
                        self.resolve_named(&found.caps),
                    ));
                }
            }
            pos = end;
        }
    }

    /// One entry per cited number: `Some(index)` when `1 <= n <= len`.
    /// Ranges wider than `max_range_span` collapse to a single `None`.
    fn resolve_numeric(&self, citation_text: &str) -> Vec<Option<usize>> {
        let lookup = |n: usize| (1..=self.references.len()).contains(&n).then(|| n - 1);
        let mut out = Vec::new();

        for caps in NUMERIC_ITEM_RE.captures_iter(citation_text) {
            let first = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok());
            let second = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok());
            match (first, second) {
                (Some(n), None) => out.push(lookup(n)),
                (Some(a), Some(b)) => {
                    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                    let within_span = hi
                        .checked_sub(lo)
                        .is_some_and(|width| width < self.settings.max_range_span);
                    if !within_span {
                        tracing::debug!(lo, hi, "numeric range too wide, leaving unresolved");
                        out.push(None);
                    } else {
                        out.extend((lo..=hi).map(lookup));
                    }
                }
                // Digits too large for usize.
                _ => out.push(None),
            }
        }
        out
    }

    fn resolve_named(&self, caps: &Captures<'_>) -> Option<usize> {
        let surname = caps.name("surname")?.as_str();
        let year: i32 = caps.name("year")?.as_str().parse().ok()?;
        let resolution = resolve_author_year(
            &self.references,
            surname,
            year,
            self.settings.fuzzy_surname_threshold,
        );
        if resolution.chosen.is_none() {
            tracing::debug!(surname, year, "author-year citation unresolved");
        }
        resolution.chosen
    }
}

/// First match at or after `pos` for `re` whose surname is plausible.
fn first_named<'t>(re: &Regex, text: &'t str, pos: usize) -> Option<Captures<'t>> {
    let mut from = pos;
    while let Some(caps) = re.captures_at(text, from) {
        let whole = caps.get(0)?;
        let surname = caps.name("surname").map_or("", |m| m.as_str());
        if !NOT_SURNAMES.contains(&surname) {
            return Some(caps);
        }
        from = whole.start() + whole.as_str().chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// Earliest match of any family at or after `pos`; ties broken by family order.
fn next_match(text: &str, pos: usize) -> Option<Found<'_>> {
    let candidates = [
        NUMERIC_RE
            .captures_at(text, pos)
            .map(|caps| Found { family: Family::Numeric, caps }),
        first_named(&NARRATIVE_RE, text, pos).map(|caps| Found {
            family: Family::Narrative,
            caps,
        }),
        first_named(&PARENTHETICAL_RE, text, pos).map(|caps| Found {
            family: Family::Parenthetical,
            caps,
        }),
        first_named(&CROSS_REF_RE, text, pos).map(|caps| Found {
            family: Family::CrossReference,
            caps,
        }),
    ];

    candidates
        .into_iter()
        .flatten()
        .min_by_key(|f| (f.start(), f.family))
}
