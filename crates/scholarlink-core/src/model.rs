use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::authors::split_full_name;
use crate::doi::normalize_doi;
use crate::matching::normalize_text;

/// An author of a document or of a referenced work.
///
/// Deserialization goes through [`AuthorRecord`] so that partial records
/// (only `full_name`, or only first/last) are completed at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AuthorRecord")]
pub struct Author {
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub affiliation: Option<String>,
    pub email: Option<String>,
    pub orcid: Option<String>,
}

/// Wire shape of an author: every field optional.
#[derive(Debug, Default, Deserialize)]
struct AuthorRecord {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    affiliation: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    orcid: Option<String>,
}

impl From<AuthorRecord> for Author {
    fn from(record: AuthorRecord) -> Self {
        Author {
            full_name: record.full_name.unwrap_or_default(),
            first_name: record.first_name,
            last_name: record.last_name,
            affiliation: record.affiliation,
            email: record.email,
            orcid: record.orcid,
        }
        .normalized()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Author {
    /// Build an author from a display name, deriving first/last names.
    ///
    /// The last whitespace-separated token becomes the last name and the
    /// remainder the first name. A single token is a last name only.
    pub fn from_full_name(name: &str) -> Self {
        Author {
            full_name: name.trim().to_string(),
            first_name: None,
            last_name: None,
            affiliation: None,
            email: None,
            orcid: None,
        }
        .normalized()
    }

    /// Build an author from separate given and family names.
    pub fn from_parts(first_name: &str, last_name: &str) -> Self {
        Author {
            full_name: String::new(),
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            affiliation: None,
            email: None,
            orcid: None,
        }
        .normalized()
    }

    /// Fill in whichever of `full_name` / `first_name` / `last_name` can be
    /// derived from the others. Blank strings count as absent.
    pub fn normalized(mut self) -> Self {
        self.first_name = non_blank(self.first_name.take());
        self.last_name = non_blank(self.last_name.take());
        self.full_name = self.full_name.trim().to_string();
        self.affiliation = non_blank(self.affiliation.take());
        self.email = non_blank(self.email.take());
        self.orcid = non_blank(self.orcid.take());

        if self.full_name.is_empty() {
            self.full_name = match (&self.first_name, &self.last_name) {
                (Some(first), Some(last)) => format!("{first} {last}"),
                (Some(only), None) | (None, Some(only)) => only.clone(),
                (None, None) => String::new(),
            };
        } else if self.first_name.is_none() && self.last_name.is_none() {
            let (first, last) = split_full_name(&self.full_name);
            self.first_name = first;
            self.last_name = last;
        }
        self
    }

    /// Surname used for citation matching: the explicit last name, falling
    /// back to the last token of the full name.
    pub fn surname(&self) -> Option<&str> {
        self.last_name
            .as_deref()
            .or_else(|| self.full_name.split_whitespace().last())
    }

    /// An author is valid when at least one name field is present.
    pub fn is_valid(&self) -> bool {
        !self.full_name.is_empty() || self.first_name.is_some() || self.last_name.is_some()
    }
}

/// A bibliography entry of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Verbatim entry text as produced by the reference parser.
    pub raw_text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
}

impl Reference {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Reference {
            raw_text: raw_text.into(),
            title: None,
            authors: Vec::new(),
            year: None,
            doi: None,
            venue: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_authors(mut self, authors: Vec<Author>) -> Self {
        self.authors = authors;
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    /// Deduplication key: the normalized DOI when present, otherwise the
    /// normalized raw text.
    pub fn identity_key(&self) -> String {
        match self.doi.as_deref().map(normalize_doi) {
            Some(doi) if !doi.is_empty() => format!("doi:{doi}"),
            _ => format!("raw:{}", normalize_text(&self.raw_text)),
        }
    }

    /// Short human label: title, else raw text.
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.raw_text)
    }

    /// Surname of the first listed author, if any.
    pub fn first_author_surname(&self) -> Option<&str> {
        self.authors.first().and_then(Author::surname)
    }
}

/// How an equation was delimited or classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquationType {
    #[default]
    Inline,
    Display,
    Definition,
    Theorem,
}

impl fmt::Display for EquationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EquationType::Inline => "inline",
            EquationType::Display => "display",
            EquationType::Definition => "definition",
            EquationType::Theorem => "theorem",
        };
        f.write_str(s)
    }
}

/// A LaTeX-delimited equation found in document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equation {
    /// Equation text including its delimiters.
    pub raw_text: String,
    #[serde(default)]
    pub symbols: BTreeSet<String>,
    #[serde(default)]
    pub equation_type: EquationType,
    #[serde(default)]
    pub context: Option<String>,
}

/// Which pattern family produced a citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationType {
    #[default]
    Numeric,
    AuthorYear,
    CrossReference,
}

/// Position of a citation: paragraph index and character offset within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationLocation {
    pub paragraph: usize,
    pub offset: usize,
}

/// An in-text citation and the reference it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationLink {
    /// Matched surface form, e.g. `[2]` or `Smith et al. (2023)`.
    pub citation_text: String,
    #[serde(default)]
    pub citation_type: CitationType,
    /// Index into the owning document's reference list; `None` if unresolved.
    pub reference: Option<usize>,
    pub context: String,
    pub location: CitationLocation,
}

impl CitationLink {
    pub fn is_resolved(&self) -> bool {
        self.reference.is_some()
    }

    /// Look up the resolved reference in `references`.
    pub fn resolved<'a>(&self, references: &'a [Reference]) -> Option<&'a Reference> {
        self.reference.and_then(|i| references.get(i))
    }
}

/// Bibliographic data about a document from an external metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub arxiv_id: Option<String>,
}
