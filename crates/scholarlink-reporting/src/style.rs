//! Inline markers and bibliography entries for the supported citation styles.

use std::fmt;
use std::str::FromStr;

use scholarlink_core::{Author, Reference};
use serde::{Deserialize, Serialize};

use crate::ReportingError;

const UNKNOWN_AUTHOR: &str = "Unknown Author";
const UNKNOWN_VENUE: &str = "Unknown venue";
const NO_DATE: &str = "n.d.";

/// IEEE lists this many authors before collapsing to "et al.".
const IEEE_MAX_AUTHORS: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    #[default]
    Apa,
    Mla,
    Chicago,
    Ieee,
}

impl CitationStyle {
    pub const ALL: [CitationStyle; 4] = [
        CitationStyle::Apa,
        CitationStyle::Mla,
        CitationStyle::Chicago,
        CitationStyle::Ieee,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CitationStyle::Apa => "apa",
            CitationStyle::Mla => "mla",
            CitationStyle::Chicago => "chicago",
            CitationStyle::Ieee => "ieee",
        }
    }

    /// Marker for a single cited reference. `number` is the reference's
    /// position in the numbered bibliography and only matters for IEEE.
    pub fn inline_marker(&self, reference: &Reference, number: usize) -> String {
        self.inline_group(&[(number, reference)])
    }

    /// Marker for several references cited together:
    /// `(Smith, 2020; Doe, 2019)` or `[1], [2]`.
    pub fn inline_group(&self, items: &[(usize, &Reference)]) -> String {
        if *self == CitationStyle::Ieee {
            return items
                .iter()
                .map(|(number, _)| format!("[{number}]"))
                .collect::<Vec<_>>()
                .join(", ");
        }
        let inner: Vec<String> = items
            .iter()
            .map(|(_, reference)| {
                let authors = short_authors(&reference.authors);
                match self {
                    CitationStyle::Apa => format!("{authors}, {}", year_or_nd(reference)),
                    CitationStyle::Chicago => format!("{authors} {}", year_or_nd(reference)),
                    _ => authors,
                }
            })
            .collect();
        format!("({})", inner.join("; "))
    }

    /// One bibliography entry.
    pub fn bibliography_entry(&self, reference: &Reference, number: usize) -> String {
        let title = clean(reference.title.as_deref()).unwrap_or("Untitled");
        let venue = clean(reference.venue.as_deref()).unwrap_or(UNKNOWN_VENUE);
        let year = year_or_nd(reference);
        let doi = reference.doi.as_deref().filter(|d| !d.trim().is_empty());

        match self {
            CitationStyle::Apa => {
                let authors = long_authors(&reference.authors);
                let mut entry = format!("{} ({year}). {title}. {venue}.", strip_period(&authors));
                if let Some(doi) = doi {
                    entry.push_str(&format!(" https://doi.org/{doi}"));
                }
                entry
            }
            CitationStyle::Mla => {
                let authors = long_authors(&reference.authors);
                let mut entry = format!("{}. \"{title}.\" {venue}, {year}", strip_period(&authors));
                if let Some(doi) = doi {
                    entry.push_str(&format!(", https://doi.org/{doi}"));
                }
                entry.push('.');
                entry
            }
            CitationStyle::Chicago => {
                let authors = long_authors(&reference.authors);
                let mut entry =
                    format!("{}. {year}. \"{title}.\" {venue}", strip_period(&authors));
                if let Some(doi) = doi {
                    entry.push_str(&format!(". https://doi.org/{doi}"));
                }
                entry.push('.');
                entry
            }
            CitationStyle::Ieee => {
                let authors = ieee_authors(&reference.authors);
                let mut entry = format!("[{number}] {authors}, \"{title},\" {venue}, {year}");
                if let Some(doi) = doi {
                    entry.push_str(&format!(", doi: {doi}"));
                }
                entry.push('.');
                entry
            }
        }
    }

    /// Entries for `items`, one per paragraph. Author-date styles sort by
    /// first author surname (APA also by year); IEEE keeps number order.
    pub fn format_bibliography(&self, items: &[(usize, &Reference)]) -> String {
        let mut sorted = items.to_vec();
        match self {
            CitationStyle::Ieee => sorted.sort_by_key(|(number, _)| *number),
            CitationStyle::Apa => sorted.sort_by_key(|(_, r)| (sort_surname(r), r.year.unwrap_or(i32::MAX))),
            CitationStyle::Mla | CitationStyle::Chicago => sorted.sort_by_key(|(_, r)| sort_surname(r)),
        }
        sorted
            .iter()
            .map(|(number, reference)| self.bibliography_entry(reference, *number))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CitationStyle {
    type Err = ReportingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "apa" => Ok(CitationStyle::Apa),
            "mla" => Ok(CitationStyle::Mla),
            "chicago" => Ok(CitationStyle::Chicago),
            "ieee" => Ok(CitationStyle::Ieee),
            _ => Err(ReportingError::UnknownStyle(s.to_string())),
        }
    }
}

fn year_or_nd(reference: &Reference) -> String {
    reference
        .year
        .map_or_else(|| NO_DATE.to_string(), |y| y.to_string())
}

fn clean(value: Option<&str>) -> Option<&str> {
    value
        .map(|v| v.trim().trim_end_matches('.').trim_end())
        .filter(|v| !v.is_empty())
}

fn strip_period(s: &str) -> &str {
    s.strip_suffix('.').unwrap_or(s)
}

fn sort_surname(reference: &Reference) -> String {
    reference
        .first_author_surname()
        .unwrap_or("Unknown")
        .to_lowercase()
}

fn short_name(author: &Author) -> &str {
    author.surname().unwrap_or(&author.full_name)
}

fn long_name(author: &Author) -> String {
    match (&author.last_name, &author.first_name) {
        (Some(last), Some(first)) => format!("{last}, {first}"),
        _ => author.full_name.clone(),
    }
}

/// `J. Smith` style: initials of the given names, then the surname.
fn initials_name(author: &Author) -> String {
    let Some(last) = author.last_name.as_deref() else {
        return author.full_name.clone();
    };
    let initials: Vec<String> = author
        .first_name
        .as_deref()
        .unwrap_or("")
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter_map(|part| part.chars().find(|c| c.is_alphabetic()))
        .map(|c| format!("{c}."))
        .collect();
    if initials.is_empty() {
        last.to_string()
    } else {
        format!("{} {last}", initials.join(" "))
    }
}

/// `Smith`, `Smith and Doe`, `Smith et al.`
fn short_authors(authors: &[Author]) -> String {
    match authors {
        [] => UNKNOWN_AUTHOR.to_string(),
        [only] => short_name(only).to_string(),
        [first, second] => format!("{} and {}", short_name(first), short_name(second)),
        [first, ..] => format!("{} et al.", short_name(first)),
    }
}

fn long_authors(authors: &[Author]) -> String {
    match authors {
        [] => UNKNOWN_AUTHOR.to_string(),
        [only] => long_name(only),
        [first, second] => format!("{} and {}", long_name(first), long_name(second)),
        [first, ..] => format!("{} et al.", long_name(first)),
    }
}

fn ieee_authors(authors: &[Author]) -> String {
    match authors {
        [] => UNKNOWN_AUTHOR.to_string(),
        [only] => initials_name(only),
        [first, second] => format!("{} and {}", initials_name(first), initials_name(second)),
        _ if authors.len() > IEEE_MAX_AUTHORS => format!("{} et al.", initials_name(&authors[0])),
        [init @ .., last] => {
            let head: Vec<String> = init.iter().map(initials_name).collect();
            format!("{}, and {}", head.join(", "), initials_name(last))
        }
    }
}
