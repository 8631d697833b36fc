use thiserror::Error;

pub mod batch;
pub mod document;
pub mod pipeline;

pub use batch::{BatchProgress, BatchReport, ErrorPolicy, run_batch};
pub use document::{
    DocumentIssue, MIN_WORDS, discover_documents, doc_id_for, load_document, load_enrichment,
    load_reference_list, validate_content,
};
pub use pipeline::{DocumentInput, DocumentOutcome, DocumentWarnings, InvalidReference, Pipeline};
// Re-export domain types for convenience
pub use scholarlink_core::{AcademicMetadata, Enrichment, Reference};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid document {doc}: {issue}")]
    Validation {
        doc: String,
        #[source]
        issue: DocumentIssue,
    },
    #[error("metadata error: {0}")]
    Metadata(#[from] scholarlink_core::MetadataError),
    #[error("store error: {0}")]
    Store(#[from] scholarlink_store::StoreError),
    #[error("batch aborted after {completed} of {total} documents: {reason}")]
    Aborted {
        completed: usize,
        total: usize,
        reason: String,
    },
}
