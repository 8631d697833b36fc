pub mod citations;
pub mod config;
pub mod document;
pub mod equations;
pub mod graph;
pub mod references;
pub mod resolve;
pub mod section;
pub mod text;

pub use citations::{CitationProcessor, CitationValidation};
pub use config::{ListOverride, ParsingConfig, ParsingConfigBuilder};
pub use document::{DocumentHeader, detect_header};
pub use equations::{EquationExtractor, ExtractionReport};
pub use graph::{CitationGraph, EdgeKind, GraphEdge, GraphNode, NodeKind};
pub use references::{HeuristicReferenceParser, ReferenceParser};
pub use resolve::{Candidate, Resolution, resolve_author_year};
// Re-export domain types from core (canonical definitions live there)
pub use scholarlink_core::{CitationLink, Equation, Reference};

/// Pull the bibliography out of a full document text.
///
/// Pipeline:
/// 1. Locate the References/Bibliography section
/// 2. Segment individual references
/// 3. Parse each with `parser` (authors, year, title, venue, DOI)
pub fn extract_references(
    text: &str,
    config: &ParsingConfig,
    parser: &dyn ReferenceParser,
) -> Vec<Reference> {
    let section = section::find_references_section(text, config);
    let raws = section::segment_references(section, config);
    tracing::debug!(count = raws.len(), "segmented reference section");
    parser.parse_all(&raws)
}
