use thiserror::Error;

pub mod aggregate;
pub mod authors;
pub mod config;
pub mod config_file;
pub mod doi;
pub mod matching;
pub mod model;
pub mod validation;

// Re-export for convenience
pub use aggregate::{AcademicMetadata, IdentifierType, MetadataBuilder, MetadataSource};
pub use config::{CitationSettings, Config, EquationSettings};
pub use model::{
    Author, CitationLink, CitationLocation, CitationType, Enrichment, Equation, EquationType,
    Reference,
};
pub use validation::{ReferenceValidator, ValidationIssue, ValidationLevel, ValidationReport};

/// Errors raised at the metadata aggregate boundary.
///
/// Data-quality problems (an unresolved citation, a reference without a
/// venue) are never errors; they are reported as data. These variants cover
/// structurally broken input only.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
    #[error(
        "citation #{citation} points at reference {index}, but only {available} references exist"
    )]
    DanglingCitation {
        citation: usize,
        index: usize,
        available: usize,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
