use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::MetadataError;
use crate::model::{Author, CitationLink, Enrichment, Reference};

/// Kind of persistent identifier attached to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    Doi,
    Arxiv,
}

/// Where the document-level bibliographic fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    Enrichment,
    #[default]
    Text,
}

/// Everything known about one document.
///
/// Invariant: every resolved citation index is `< references.len()`, and
/// references are unique by [`Reference::identity_key`]. Both are enforced
/// by [`MetadataBuilder::build`]; the citation invariant is re-checked by
/// [`AcademicMetadata::from_value`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicMetadata {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub citations: Vec<CitationLink>,
    /// Raw text of each extracted equation, delimiters included.
    #[serde(default)]
    pub equations: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub identifier_type: Option<IdentifierType>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub source: MetadataSource,
}

impl AcademicMetadata {
    pub fn builder() -> MetadataBuilder {
        MetadataBuilder::new()
    }

    pub fn to_value(&self) -> Result<serde_json::Value, MetadataError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from untyped JSON, rejecting structurally broken input.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MetadataError> {
        let Some(object) = value.as_object() else {
            return Err(MetadataError::Malformed {
                what: "metadata",
                reason: "expected a JSON object".to_string(),
            });
        };
        if object.get("title").is_none_or(|t| t.is_null()) {
            return Err(MetadataError::MissingField("title"));
        }

        let metadata: AcademicMetadata = serde_json::from_value(value)?;
        metadata.check_citations()?;
        Ok(metadata)
    }

    /// Every resolved citation must point into `references`.
    pub fn check_citations(&self) -> Result<(), MetadataError> {
        check_citations(&self.citations, self.references.len())
    }

    pub fn to_json_string(&self) -> Result<String, MetadataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, MetadataError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Citations that did not resolve to a reference.
    pub fn unresolved_citations(&self) -> impl Iterator<Item = &CitationLink> {
        self.citations.iter().filter(|c| !c.is_resolved())
    }
}

fn check_citations(citations: &[CitationLink], available: usize) -> Result<(), MetadataError> {
    for (i, link) in citations.iter().enumerate() {
        if let Some(index) = link.reference {
            if index >= available {
                return Err(MetadataError::DanglingCitation {
                    citation: i,
                    index,
                    available,
                });
            }
        }
    }
    Ok(())
}

/// Composes an [`AcademicMetadata`] from text-derived parts and optional
/// enrichment.
///
/// Enrichment values take precedence over text-derived ones; text fills the
/// gaps.
#[derive(Debug, Clone, Default)]
pub struct MetadataBuilder {
    title: Option<String>,
    authors: Vec<Author>,
    abstract_text: Option<String>,
    references: Vec<Reference>,
    citations: Vec<CitationLink>,
    equations: Vec<String>,
    arxiv_id: Option<String>,
    enrichment: Option<Enrichment>,
}

impl MetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn authors(mut self, authors: Vec<Author>) -> Self {
        self.authors = authors;
        self
    }

    pub fn abstract_text(mut self, abstract_text: Option<String>) -> Self {
        self.abstract_text = abstract_text;
        self
    }

    pub fn references(mut self, references: Vec<Reference>) -> Self {
        self.references = references;
        self
    }

    /// Citation links whose indices point into the list given to
    /// [`references`](Self::references).
    pub fn citations(mut self, citations: Vec<CitationLink>) -> Self {
        self.citations = citations;
        self
    }

    pub fn equations<I, S>(mut self, equations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.equations = equations.into_iter().map(Into::into).collect();
        self
    }

    /// arXiv identifier found in the document itself. A DOI or arXiv id
    /// from enrichment replaces it.
    pub fn arxiv_id(mut self, arxiv_id: Option<String>) -> Self {
        self.arxiv_id = arxiv_id.filter(|a| !a.trim().is_empty());
        self
    }

    pub fn enrichment(mut self, enrichment: Option<Enrichment>) -> Self {
        self.enrichment = enrichment;
        self
    }

    /// Validate and assemble.
    ///
    /// References are deduplicated by identity key (first occurrence kept)
    /// and citation indices remapped onto the deduplicated list. A citation
    /// pointing past the supplied references is a
    /// [`MetadataError::DanglingCitation`].
    pub fn build(self) -> Result<AcademicMetadata, MetadataError> {
        check_citations(&self.citations, self.references.len())?;

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut remap = Vec::with_capacity(self.references.len());
        let mut references = Vec::with_capacity(self.references.len());
        for mut reference in self.references {
            reference.authors = reference.authors.into_iter().map(Author::normalized).collect();
            let key = reference.identity_key();
            let index = *seen.entry(key).or_insert_with(|| {
                references.push(reference);
                references.len() - 1
            });
            remap.push(index);
        }
        if references.len() < remap.len() {
            tracing::debug!(
                before = remap.len(),
                after = references.len(),
                "deduplicated references"
            );
        }

        let citations = self
            .citations
            .into_iter()
            .map(|mut link| {
                link.reference = link.reference.map(|i| remap[i]);
                link
            })
            .collect();

        let authors: Vec<Author> = self.authors.into_iter().map(Author::normalized).collect();
        let identifier_type = self.arxiv_id.as_ref().map(|_| IdentifierType::Arxiv);
        let mut metadata = AcademicMetadata {
            title: self.title.map(|t| t.trim().to_string()).unwrap_or_default(),
            authors,
            abstract_text: self.abstract_text.filter(|a| !a.trim().is_empty()),
            references,
            citations,
            equations: self.equations,
            year: None,
            identifier: self.arxiv_id,
            identifier_type,
            journal: None,
            source: MetadataSource::Text,
        };

        if let Some(enrichment) = self.enrichment {
            apply_enrichment(&mut metadata, enrichment);
        }

        Ok(metadata)
    }
}

fn apply_enrichment(metadata: &mut AcademicMetadata, enrichment: Enrichment) {
    let mut applied = false;

    if let Some(title) = enrichment.title.filter(|t| !t.trim().is_empty()) {
        metadata.title = title.trim().to_string();
        applied = true;
    }
    let authors: Vec<Author> = enrichment
        .authors
        .into_iter()
        .map(Author::normalized)
        .filter(Author::is_valid)
        .collect();
    if !authors.is_empty() {
        metadata.authors = authors;
        applied = true;
    }
    if enrichment.year.is_some() {
        metadata.year = enrichment.year;
        applied = true;
    }
    if let Some(venue) = enrichment.venue.filter(|v| !v.trim().is_empty()) {
        metadata.journal = Some(venue);
        applied = true;
    }
    if let Some(doi) = enrichment.doi.filter(|d| !d.trim().is_empty()) {
        metadata.identifier = Some(doi);
        metadata.identifier_type = Some(IdentifierType::Doi);
        applied = true;
    } else if let Some(arxiv) = enrichment.arxiv_id.filter(|a| !a.trim().is_empty()) {
        metadata.identifier = Some(arxiv);
        metadata.identifier_type = Some(IdentifierType::Arxiv);
        applied = true;
    }

    if applied {
        metadata.source = MetadataSource::Enrichment;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CitationLocation, CitationType};
    use serde_json::json;

    fn link(reference: Option<usize>) -> CitationLink {
        CitationLink {
            citation_text: "[1]".into(),
            citation_type: CitationType::Numeric,
            reference,
            context: "as shown in [1]".into(),
            location: CitationLocation {
                paragraph: 0,
                offset: 12,
            },
        }
    }

    #[test]
    fn test_build_defaults_title_to_empty() {
        let metadata = MetadataBuilder::new().build().unwrap();
        assert_eq!(metadata.title, "");
        assert_eq!(metadata.source, MetadataSource::Text);
        let value = metadata.to_value().unwrap();
        assert_eq!(value["title"], json!(""));
        assert!(value.get("abstract").is_some());
    }

    #[test]
    fn test_build_rejects_dangling_citation() {
        let err = MetadataBuilder::new()
            .references(vec![Reference::new("A")])
            .citations(vec![link(Some(0)), link(Some(1))])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            MetadataError::DanglingCitation {
                citation: 1,
                index: 1,
                available: 1
            }
        ));
    }

    #[test]
    fn test_build_dedups_and_remaps() {
        let metadata = MetadataBuilder::new()
            .references(vec![
                Reference::new("Alpha paper").with_doi("10.1000/a"),
                Reference::new("Beta paper"),
                Reference::new("Alpha paper, again").with_doi("https://doi.org/10.1000/A"),
            ])
            .citations(vec![link(Some(2)), link(Some(1)), link(None)])
            .build()
            .unwrap();
        assert_eq!(metadata.references.len(), 2);
        assert_eq!(metadata.references[0].raw_text, "Alpha paper");
        let indices: Vec<_> = metadata.citations.iter().map(|c| c.reference).collect();
        assert_eq!(indices, vec![Some(0), Some(1), None]);
        assert_eq!(metadata.unresolved_citations().count(), 1);
    }

    #[test]
    fn test_enrichment_takes_precedence() {
        let metadata = MetadataBuilder::new()
            .title("Title From Text")
            .authors(vec![Author::from_full_name("Text Author")])
            .enrichment(Some(Enrichment {
                title: Some("Registered Title".into()),
                authors: vec![Author::from_full_name("Real Author")],
                year: Some(2021),
                venue: Some("Nature".into()),
                doi: Some("10.1038/x1".into()),
                arxiv_id: Some("2101.00001".into()),
            }))
            .build()
            .unwrap();
        assert_eq!(metadata.title, "Registered Title");
        assert_eq!(metadata.authors[0].full_name, "Real Author");
        assert_eq!(metadata.journal.as_deref(), Some("Nature"));
        assert_eq!(metadata.identifier.as_deref(), Some("10.1038/x1"));
        assert_eq!(metadata.identifier_type, Some(IdentifierType::Doi));
        assert_eq!(metadata.source, MetadataSource::Enrichment);
    }

    #[test]
    fn test_empty_enrichment_keeps_text_source() {
        let metadata = MetadataBuilder::new()
            .title("Only Text")
            .enrichment(Some(Enrichment::default()))
            .build()
            .unwrap();
        assert_eq!(metadata.title, "Only Text");
        assert_eq!(metadata.source, MetadataSource::Text);
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let metadata = MetadataBuilder::new()
            .title("Paper")
            .authors(vec![Author::from_parts("Ada", "Lovelace")])
            .abstract_text(Some("We study things.".into()))
            .references(vec![
                Reference::new("Smith 2020")
                    .with_year(2020)
                    .with_authors(vec![Author::from_full_name("J Smith")]),
            ])
            .citations(vec![link(Some(0))])
            .equations(["$$E=mc^2$$"])
            .enrichment(Some(Enrichment {
                arxiv_id: Some("2101.00001".into()),
                ..Default::default()
            }))
            .build()
            .unwrap();

        let value = metadata.to_value().unwrap();
        assert_eq!(AcademicMetadata::from_value(value).unwrap(), metadata);
        assert_eq!(
            metadata.references[0].authors[0].last_name.as_deref(),
            Some("Smith")
        );

        let text = metadata.to_json_string().unwrap();
        assert_eq!(AcademicMetadata::from_json_str(&text).unwrap(), metadata);
    }

    #[test]
    fn test_reference_authors_with_only_full_name_round_trip() {
        let bare = Author {
            full_name: "John Smith".into(),
            first_name: None,
            last_name: None,
            affiliation: None,
            email: None,
            orcid: None,
        };
        let metadata = MetadataBuilder::new()
            .title("Paper")
            .references(vec![Reference::new("Smith 2020").with_authors(vec![bare])])
            .build()
            .unwrap();

        let author = &metadata.references[0].authors[0];
        assert_eq!(author.first_name.as_deref(), Some("John"));
        assert_eq!(author.last_name.as_deref(), Some("Smith"));
        let value = metadata.to_value().unwrap();
        assert_eq!(AcademicMetadata::from_value(value).unwrap(), metadata);
    }

    #[test]
    fn test_text_arxiv_id_yields_to_enrichment() {
        let from_text = MetadataBuilder::new()
            .title("Paper")
            .arxiv_id(Some("1706.03762".into()))
            .build()
            .unwrap();
        assert_eq!(from_text.identifier.as_deref(), Some("1706.03762"));
        assert_eq!(from_text.identifier_type, Some(IdentifierType::Arxiv));
        assert_eq!(from_text.source, MetadataSource::Text);

        let enriched = MetadataBuilder::new()
            .title("Paper")
            .arxiv_id(Some("1706.03762".into()))
            .enrichment(Some(Enrichment {
                doi: Some("10.1234/abc".into()),
                ..Default::default()
            }))
            .build()
            .unwrap();
        assert_eq!(enriched.identifier.as_deref(), Some("10.1234/abc"));
        assert_eq!(enriched.identifier_type, Some(IdentifierType::Doi));
    }

    #[test]
    fn test_from_value_missing_title() {
        let err = AcademicMetadata::from_value(json!({"authors": []})).unwrap_err();
        assert!(matches!(err, MetadataError::MissingField("title")));
        let err = AcademicMetadata::from_value(json!({"title": null})).unwrap_err();
        assert!(matches!(err, MetadataError::MissingField("title")));
    }

    #[test]
    fn test_from_value_not_object() {
        let err = AcademicMetadata::from_value(json!("paper")).unwrap_err();
        assert!(matches!(err, MetadataError::Malformed { .. }));
    }

    #[test]
    fn test_from_value_rechecks_citation_invariant() {
        let value = json!({
            "title": "T",
            "references": [],
            "citations": [{
                "citation_text": "[3]",
                "reference": 2,
                "context": "see [3]",
                "location": {"paragraph": 0, "offset": 4}
            }]
        });
        let err = AcademicMetadata::from_value(value).unwrap_err();
        assert!(matches!(err, MetadataError::DanglingCitation { index: 2, .. }));
    }

    #[test]
    fn test_from_value_fills_defaults() {
        let metadata = AcademicMetadata::from_value(json!({"title": "Bare"})).unwrap();
        assert!(metadata.references.is_empty());
        assert_eq!(metadata.abstract_text, None);
        assert_eq!(metadata.source, MetadataSource::Text);
    }
}
