//! Post-processing of generated answers: citation markers, display math
//! layout and an appended reference list.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scholarlink_core::{CitationSettings, Reference};
use scholarlink_parsing::resolve_author_year;

use crate::ReportingError;
use crate::history::{ResponseRecord, ResponseSink};
use crate::style::CitationStyle;

const SURNAME: &str = r"\p{Lu}[\p{L}'’\-]+";

/// Numeric lists and ranges, `(Surname[ …], YYYY)` and `Surname[ …] (YYYY)`, in that
/// order of preference at a given position.
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?P<numeric>\[\s*\d+(?:\s*[-–]\s*\d+)?(?:\s*[,;]\s*\d+(?:\s*[-–]\s*\d+)?)*\s*\])|\((?P<psurname>{SURNAME})(?:\s+et\s+al\.?|\s+(?:and|&)\s+{SURNAME})?,\s*(?P<pyear>\d{{4}})[a-z]?\)|\b(?P<nauthors>(?P<nsurname>{SURNAME})(?:\s+et\s+al\.?|\s+(?:and|&)\s+{SURNAME})?),?\s+\((?P<nyear>\d{{4}})[a-z]?\)"
    ))
    .unwrap()
});

static NUMBER_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(?:\s*[-–]\s*(\d+))?").unwrap());

static DISPLAY_MATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap());

/// A processed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedResponse {
    /// The answer with markers restyled, display math on its own lines, and
    /// the reference section appended.
    pub text: String,
    /// The reference section body alone (empty when there are no references).
    pub bibliography: String,
    /// Indices of cited references in order of first appearance.
    pub cited: Vec<usize>,
}

/// Restyles citation markers in generated answers.
#[derive(Debug, Clone)]
pub struct AcademicResponseProcessor {
    style: CitationStyle,
    fuzzy_threshold: f64,
    max_range_span: usize,
}

/// Marker rewriting state for one answer.
struct Citer<'r> {
    style: CitationStyle,
    references: &'r [Reference],
    fuzzy_threshold: f64,
    max_range_span: usize,
    /// Reference index to its 1-based number in order of first appearance.
    numbers: HashMap<usize, usize>,
    cited: Vec<usize>,
}

impl Citer<'_> {
    fn number_for(&mut self, index: usize) -> usize {
        let next = self.cited.len() + 1;
        *self.numbers.entry(index).or_insert_with(|| {
            self.cited.push(index);
            next
        })
    }

    fn group(&mut self, indices: &[usize]) -> String {
        let numbered: Vec<usize> = indices.iter().map(|&i| self.number_for(i)).collect();
        let items: Vec<(usize, &Reference)> = numbered
            .iter()
            .zip(indices)
            .map(|(&n, &i)| (n, &self.references[i]))
            .collect();
        self.style.inline_group(&items)
    }

    fn author_year(&self, surname: &str, year: &str) -> Option<usize> {
        let year: i32 = year.parse().ok()?;
        resolve_author_year(self.references, surname, year, self.fuzzy_threshold).chosen
    }

    /// Zero-based indices for a numeric marker, `None` unless every number
    /// resolves. Ranges are expanded up to `max_range_span` entries.
    fn numeric_indices(&self, marker: &str) -> Option<Vec<usize>> {
        let lookup = |n: usize| (1..=self.references.len()).contains(&n).then(|| n - 1);
        let mut indices = Vec::new();
        for caps in NUMBER_ITEM_RE.captures_iter(marker) {
            let first: usize = caps.get(1)?.as_str().parse().ok()?;
            match caps.get(2) {
                None => indices.push(lookup(first)?),
                Some(second) => {
                    let second: usize = second.as_str().parse().ok()?;
                    let (lo, hi) = (first.min(second), first.max(second));
                    if hi - lo >= self.max_range_span {
                        return None;
                    }
                    for n in lo..=hi {
                        indices.push(lookup(n)?);
                    }
                }
            }
        }
        let mut unique = Vec::with_capacity(indices.len());
        for index in indices {
            if !unique.contains(&index) {
                unique.push(index);
            }
        }
        Some(unique)
    }

    /// The replacement for one marker, or `None` to leave it as written.
    fn rewrite(&mut self, caps: &Captures<'_>) -> Option<String> {
        if let Some(numeric) = caps.name("numeric") {
            let indices = self.numeric_indices(numeric.as_str())?;
            return Some(self.group(&indices));
        }

        if let (Some(surname), Some(year)) = (caps.name("psurname"), caps.name("pyear")) {
            let index = self.author_year(surname.as_str(), year.as_str())?;
            return Some(self.group(&[index]));
        }

        let (authors, surname, year) =
            (caps.name("nauthors")?, caps.name("nsurname")?, caps.name("nyear")?);
        let index = self.author_year(surname.as_str(), year.as_str())?;
        let marker = self.group(&[index]);
        Some(match self.style {
            // Narrative IEEE keeps the author names in the sentence.
            CitationStyle::Ieee => format!("{} {marker}", authors.as_str()),
            _ => marker,
        })
    }

    fn process(&mut self, text: &str) -> String {
        MARKER_RE
            .replace_all(text, |caps: &Captures<'_>| {
                self.rewrite(caps).unwrap_or_else(|| {
                    tracing::debug!(marker = &caps[0], "leaving unresolved citation marker");
                    caps[0].to_string()
                })
            })
            .into_owned()
    }
}

impl AcademicResponseProcessor {
    pub fn new(style: CitationStyle) -> Self {
        Self {
            style,
            fuzzy_threshold: CitationSettings::default().fuzzy_surname_threshold,
            max_range_span: CitationSettings::default().max_range_span,
        }
    }

    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    /// Widest `[a-b]` range that is expanded; wider ranges stay as written.
    pub fn with_max_range_span(mut self, span: usize) -> Self {
        self.max_range_span = span;
        self
    }

    pub fn style(&self) -> CitationStyle {
        self.style
    }

    /// Restyle `answer` against `references`.
    ///
    /// `[n]` refers to `references[n - 1]`. Markers that do not resolve are
    /// left as written. Text inside `$$…$$` is never rewritten.
    pub fn process_response(&self, answer: &str, references: &[Reference]) -> FormattedResponse {
        let mut citer = Citer {
            style: self.style,
            references,
            fuzzy_threshold: self.fuzzy_threshold,
            max_range_span: self.max_range_span,
            numbers: HashMap::new(),
            cited: Vec::new(),
        };

        let mut text = String::with_capacity(answer.len());
        let mut last = 0;
        for m in DISPLAY_MATH_RE.find_iter(answer) {
            let before = citer.process(&answer[last..m.start()]);
            push_display_math(&mut text, &before, m.as_str());
            last = m.end();
        }
        let rest = citer.process(&answer[last..]);
        if last > 0 && !rest.is_empty() && !rest.starts_with('\n') {
            text.push('\n');
            text.push_str(rest.trim_start_matches([' ', '\t']));
        } else {
            text.push_str(&rest);
        }

        let cited = citer.cited;
        let items: Vec<(usize, &Reference)> = if cited.is_empty() {
            references.iter().enumerate().map(|(i, r)| (i + 1, r)).collect()
        } else {
            cited
                .iter()
                .enumerate()
                .map(|(n, &i)| (n + 1, &references[i]))
                .collect()
        };
        let bibliography = self.style.format_bibliography(&items);

        if !bibliography.is_empty() {
            text.push_str("\n\n## References\n\n");
            text.push_str(&bibliography);
        }

        tracing::debug!(
            style = %self.style,
            cited = cited.len(),
            references = references.len(),
            "processed response"
        );

        FormattedResponse {
            text,
            bibliography,
            cited,
        }
    }

    /// The Query / Response / Search Mode document for one answer.
    pub fn format_academic_response(
        &self,
        query: &str,
        answer: &str,
        mode: &str,
        references: &[Reference],
    ) -> String {
        let formatted = self.process_response(answer, references);
        format!(
            "### Query\n{}\n\n### Response\n{}\n\n### Search Mode\n{}",
            query.trim(),
            formatted.text.trim(),
            mode.trim()
        )
    }

    /// Format an answer and record it in `sink`.
    pub fn save_academic_response(
        &self,
        sink: &dyn ResponseSink,
        query: &str,
        answer: &str,
        mode: &str,
        references: &[Reference],
    ) -> Result<String, ReportingError> {
        let document = self.format_academic_response(query, answer, mode, references);
        let record = ResponseRecord::new(query, mode, self.style, &document);
        sink.record(&record)?;
        Ok(document)
    }
}

/// Append `before` then `math` so the equation sits on its own line.
fn push_display_math(out: &mut String, before: &str, math: &str) {
    let before = if before.ends_with('\n') {
        before
    } else {
        before.trim_end_matches([' ', '\t'])
    };
    out.push_str(before);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    let body = &math[2..math.len() - 2];
    out.push_str("$$");
    out.push_str(body.trim());
    out.push_str("$$");
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarlink_core::Author;

    fn refs() -> Vec<Reference> {
        vec![
            Reference::new("Smith 2020")
                .with_authors(vec![Author::from_parts("John", "Smith")])
                .with_year(2020)
                .with_title("Deep learning")
                .with_venue("Nature"),
            Reference::new("Doe 2019")
                .with_authors(vec![Author::from_parts("Jane", "Doe")])
                .with_year(2019)
                .with_title("Shallow learning")
                .with_venue("Science"),
        ]
    }

    #[test]
    fn test_numeric_markers_restyled() {
        let out = AcademicResponseProcessor::new(CitationStyle::Apa)
            .process_response("Deep nets work [1] and so on [2].", &refs());
        assert!(out.text.starts_with("Deep nets work (Smith, 2020) and so on (Doe, 2019)."));
        assert_eq!(out.cited, vec![0, 1]);
    }

    #[test]
    fn test_ieee_numbers_by_first_appearance() {
        let out = AcademicResponseProcessor::new(CitationStyle::Ieee)
            .process_response("First [2], then [1], again [2].", &refs());
        assert!(out.text.starts_with("First [1], then [2], again [1]."));
        assert_eq!(out.cited, vec![1, 0]);
        assert!(out.bibliography.starts_with("[1] J. Doe"));
    }

    #[test]
    fn test_author_year_markers() {
        let processor = AcademicResponseProcessor::new(CitationStyle::Chicago);
        let out = processor.process_response("As Smith (2020) showed, see also (Doe, 2019).", &refs());
        assert!(out.text.starts_with("As (Smith 2020) showed, see also (Doe 2019)."));

        let ieee = AcademicResponseProcessor::new(CitationStyle::Ieee)
            .process_response("As Smith (2020) showed.", &refs());
        assert!(ieee.text.starts_with("As Smith [1] showed."));
    }

    #[test]
    fn test_unresolved_markers_untouched() {
        let out = AcademicResponseProcessor::new(CitationStyle::Apa)
            .process_response("See [9], [1, 7] and Nobody (1999).", &refs());
        assert!(out.text.starts_with("See [9], [1, 7] and Nobody (1999)."));
        assert!(out.cited.is_empty());
        // nothing cited: every reference is listed
        assert_eq!(out.bibliography.split("\n\n").count(), 2);
    }

    #[test]
    fn test_numeric_ranges_expanded() {
        let three = {
            let mut r = refs();
            r.push(
                Reference::new("Roe 2021")
                    .with_authors(vec![Author::from_parts("Rick", "Roe")])
                    .with_year(2021),
            );
            r
        };
        let apa = AcademicResponseProcessor::new(CitationStyle::Apa);
        let out = apa.process_response("Known [1-3].", &three);
        assert!(out.text.starts_with("Known (Smith, 2020; Doe, 2019; Roe, 2021)."));
        assert_eq!(out.cited, vec![0, 1, 2]);

        let ieee = AcademicResponseProcessor::new(CitationStyle::Ieee)
            .process_response("Known [3\u{2013}2].", &three);
        assert!(ieee.text.starts_with("Known [1], [2]."));
        assert_eq!(ieee.cited, vec![1, 2]);

        let narrow = apa.with_max_range_span(2).process_response("Known [1-3].", &three);
        assert!(narrow.text.starts_with("Known [1-3]."));
        assert!(narrow.cited.is_empty());
    }

    #[test]
    fn test_display_math_on_own_lines() {
        let processor = AcademicResponseProcessor::new(CitationStyle::Apa);
        let once = processor.process_response("Energy is $$ E=mc^2 $$ as shown.", &[]);
        assert_eq!(once.text, "Energy is\n$$E=mc^2$$\nas shown.");
        let twice = processor.process_response(&once.text, &[]);
        assert_eq!(twice.text, once.text);
    }

    #[test]
    fn test_markers_inside_math_untouched() {
        let out = AcademicResponseProcessor::new(CitationStyle::Apa)
            .process_response("Index $$x[1]$$ here [1].", &refs());
        assert!(out.text.contains("$$x[1]$$"));
        assert!(out.text.contains("here (Smith, 2020)."));
    }

    #[test]
    fn test_reference_section_appended() {
        let out = AcademicResponseProcessor::new(CitationStyle::Apa)
            .process_response("Only [2].", &refs());
        assert_eq!(
            out.text,
            "Only (Doe, 2019).\n\n## References\n\nDoe, Jane (2019). Shallow learning. Science."
        );
        assert_eq!(out.bibliography, "Doe, Jane (2019). Shallow learning. Science.");
    }

    #[test]
    fn test_no_references_no_section() {
        let out = AcademicResponseProcessor::new(CitationStyle::Mla).process_response("Plain.", &[]);
        assert_eq!(out.text, "Plain.");
        assert!(out.bibliography.is_empty());
    }

    #[test]
    fn test_format_academic_response() {
        let doc = AcademicResponseProcessor::new(CitationStyle::Mla).format_academic_response(
            "What is deep learning?",
            "It is learning [1].",
            "hybrid",
            &refs(),
        );
        assert!(doc.starts_with("### Query\nWhat is deep learning?\n\n### Response\nIt is learning (Smith)."));
        assert!(doc.ends_with("### Search Mode\nhybrid"));
    }
}
