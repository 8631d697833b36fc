//! Per-document processing: text in, [`AcademicMetadata`] out.

use scholarlink_core::{
    AcademicMetadata, Config, Enrichment, Equation, Reference, ReferenceValidator,
    ValidationIssue, ValidationLevel,
};
use scholarlink_parsing::section::strip_references_section;
use scholarlink_parsing::{
    CitationProcessor, EquationExtractor, HeuristicReferenceParser, ParsingConfig,
    ParsingConfigBuilder, ReferenceParser, detect_header, extract_references,
};

use crate::IngestError;
use crate::document::validate_content;

/// A document ready for processing.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub doc_id: String,
    pub text: String,
    /// Pre-segmented reference strings. When absent the bibliography is
    /// located and segmented from `text`.
    pub raw_references: Option<Vec<String>>,
    pub enrichment: Option<Enrichment>,
}

impl DocumentInput {
    pub fn new(doc_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            text: text.into(),
            raw_references: None,
            enrichment: None,
        }
    }

    pub fn with_raw_references(mut self, raws: Vec<String>) -> Self {
        self.raw_references = Some(raws);
        self
    }

    pub fn with_enrichment(mut self, enrichment: Enrichment) -> Self {
        self.enrichment = Some(enrichment);
        self
    }
}

/// A reference that failed validation, by its position in the parsed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidReference {
    pub index: usize,
    pub issues: Vec<ValidationIssue>,
}

/// Problems found while processing that did not stop it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentWarnings {
    /// Citation texts that matched no reference.
    pub unresolved_citations: Vec<String>,
    /// Equation delimiters that could not be closed.
    pub skipped_equations: usize,
    pub invalid_references: Vec<InvalidReference>,
}

impl DocumentWarnings {
    pub fn is_clean(&self) -> bool {
        self.unresolved_citations.is_empty()
            && self.skipped_equations == 0
            && self.invalid_references.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub doc_id: String,
    pub metadata: AcademicMetadata,
    /// Equations with their classification, symbols and context. The
    /// metadata keeps only the raw text.
    pub equations: Vec<Equation>,
    pub warnings: DocumentWarnings,
}

/// Reference parsing, citation linking and equation extraction wired
/// together under one configuration.
pub struct Pipeline {
    parsing: ParsingConfig,
    validator: ReferenceValidator,
    parser: Box<dyn ReferenceParser>,
}

impl Pipeline {
    pub fn new(parsing: ParsingConfig, level: ValidationLevel) -> Self {
        let parser = Box::new(HeuristicReferenceParser::new(&parsing));
        Self {
            parsing,
            validator: ReferenceValidator::new(level),
            parser,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, regex::Error> {
        let parsing = ParsingConfigBuilder::from_config(config).build()?;
        Ok(Self::new(parsing, config.validation_level))
    }

    /// Replace the reference parser.
    pub fn with_parser(mut self, parser: Box<dyn ReferenceParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_validator(mut self, validator: ReferenceValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn parsing(&self) -> &ParsingConfig {
        &self.parsing
    }

    /// Process one document.
    ///
    /// Pipeline:
    /// 1. Reject empty, blank or too-short text
    /// 2. Parse references (supplied list, else the bibliography section)
    /// 3. Validate each reference at the configured level
    /// 4. Link citations in the body (text before the bibliography)
    /// 5. Extract equations from the body
    /// 6. Detect title, abstract and arXiv stamp, then compose with enrichment
    pub fn process(&self, input: DocumentInput) -> Result<DocumentOutcome, IngestError> {
        let DocumentInput {
            doc_id,
            text,
            raw_references,
            enrichment,
        } = input;

        validate_content(&text).map_err(|issue| IngestError::Validation {
            doc: doc_id.clone(),
            issue,
        })?;

        let references: Vec<Reference> = match raw_references {
            Some(raws) => self.parser.parse_all(&raws),
            None => extract_references(&text, &self.parsing, self.parser.as_ref()),
        };

        let invalid_references: Vec<InvalidReference> = references
            .iter()
            .enumerate()
            .filter_map(|(index, reference)| {
                let report = self.validator.validate(reference);
                (!report.passed()).then(|| InvalidReference {
                    index,
                    issues: report.issues,
                })
            })
            .collect();
        for invalid in &invalid_references {
            tracing::warn!(
                doc_id = %doc_id,
                index = invalid.index,
                issues = invalid.issues.len(),
                "reference failed validation"
            );
        }

        let body = strip_references_section(&text, &self.parsing);

        let mut processor = CitationProcessor::new(references, &self.parsing);
        processor.process_citations(body);
        let unresolved_citations: Vec<String> = processor
            .validate_citations()
            .unresolved
            .into_iter()
            .map(|link| link.citation_text)
            .collect();
        let (references, citations) = processor.into_parts();

        let report = EquationExtractor::new(&self.parsing).extract(body);
        let header = detect_header(body);

        let mut builder = AcademicMetadata::builder()
            .abstract_text(header.abstract_text)
            .references(references)
            .citations(citations)
            .equations(report.equations.iter().map(|e| e.raw_text.clone()))
            .arxiv_id(header.arxiv_id)
            .enrichment(enrichment);
        if let Some(title) = header.title {
            builder = builder.title(title);
        }
        let metadata = builder.build()?;

        let warnings = DocumentWarnings {
            unresolved_citations,
            skipped_equations: report.skipped,
            invalid_references,
        };

        tracing::info!(
            doc_id = %doc_id,
            references = metadata.references.len(),
            citations = metadata.citations.len(),
            unresolved = warnings.unresolved_citations.len(),
            equations = report.equations.len(),
            "processed document"
        );

        Ok(DocumentOutcome {
            doc_id,
            metadata,
            equations: report.equations,
            warnings,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(ParsingConfig::default(), ValidationLevel::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentIssue;
    use scholarlink_core::Author;

    const PAPER: &str = "\
# Learning to Link

Abstract: We link citations to references in plain text documents.

Prior work [1] studied this, and Smith (2020) extended it. Our loss is $L = x^2$ over inputs.

## References

[1] Smith, J. (2020). Linking citations in text. Journal of Links, 4(2), 1-10.
[2] Doe, A. (2019). Another paper on the topic. In Proceedings of Things.
";

    #[test]
    fn test_process_extracts_everything() {
        let outcome = Pipeline::default()
            .process(DocumentInput::new("paper", PAPER))
            .unwrap();
        let metadata = &outcome.metadata;

        assert_eq!(outcome.doc_id, "paper");
        assert_eq!(metadata.title, "Learning to Link");
        assert!(metadata.abstract_text.as_deref().unwrap().starts_with("We link"));
        assert_eq!(metadata.references.len(), 2);
        assert_eq!(metadata.citations.len(), 2);
        assert!(metadata.citations.iter().all(|c| c.reference == Some(0)));
        assert_eq!(metadata.equations, vec!["$L = x^2$"]);
        assert_eq!(outcome.equations.len(), 1);
        assert!(outcome.warnings.unresolved_citations.is_empty());
    }

    #[test]
    fn test_supplied_references_and_unresolved_warning() {
        let text = "A study of things [1] and more things [3] in this short document body.";
        let input = DocumentInput::new("doc", text)
            .with_raw_references(vec!["Doe, A. (2019). A paper. Venue.".to_string()]);
        let outcome = Pipeline::default().process(input).unwrap();
        assert_eq!(outcome.metadata.references.len(), 1);
        assert_eq!(outcome.warnings.unresolved_citations, vec!["[3]"]);
        assert!(!outcome.warnings.is_clean());
    }

    #[test]
    fn test_enrichment_overrides_detected_title() {
        let enrichment = Enrichment {
            title: Some("Official Title".into()),
            authors: vec![Author::from_full_name("Ada Lovelace")],
            ..Enrichment::default()
        };
        let input = DocumentInput::new("paper", PAPER).with_enrichment(enrichment);
        let outcome = Pipeline::default().process(input).unwrap();
        assert_eq!(outcome.metadata.title, "Official Title");
        assert_eq!(outcome.metadata.authors.len(), 1);
    }

    #[test]
    fn test_arxiv_stamp_becomes_identifier() {
        let stamped = format!("arXiv:2301.12345v2 [cs.CL]\n\n{PAPER}");
        let outcome = Pipeline::default()
            .process(DocumentInput::new("paper", stamped))
            .unwrap();
        assert_eq!(outcome.metadata.title, "Learning to Link");
        assert_eq!(outcome.metadata.identifier.as_deref(), Some("2301.12345v2"));
        assert_eq!(
            outcome.metadata.identifier_type,
            Some(scholarlink_core::IdentifierType::Arxiv)
        );
    }

    #[test]
    fn test_short_text_rejected() {
        let err = Pipeline::default()
            .process(DocumentInput::new("tiny", "too short"))
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Validation { ref doc, issue: DocumentIssue::TooShort { words: 2 } } if doc == "tiny"
        ));
    }
}
