use std::path::PathBuf;

use thiserror::Error;

pub mod consolidator;
pub mod lock;
pub mod summary;

pub use consolidator::{
    MetadataConsolidator, Store, StoredDocument, UpdateOutcome, initialize_consolidated_json,
    load_store, remove_document_metadata, update_document_metadata, update_document_record,
};
pub use summary::{
    EquationReference, NetworkEdge, StoreStats, citation_network, equation_references,
    store_stats,
};
// Re-export domain types from core (canonical definitions live there)
pub use scholarlink_core::AcademicMetadata;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("store {} has an invalid entry for `{doc_id}`: {source}", path.display())]
    InvalidEntry {
        path: PathBuf,
        doc_id: String,
        #[source]
        source: scholarlink_core::MetadataError,
    },
    #[error("failed to serialize store: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
