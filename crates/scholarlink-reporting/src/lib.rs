use thiserror::Error;

pub mod history;
pub mod response;
pub mod style;

pub use history::{JsonlHistory, ResponseRecord, ResponseSink, load_history};
pub use response::{AcademicResponseProcessor, FormattedResponse};
pub use style::CitationStyle;

#[derive(Error, Debug)]
pub enum ReportingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown citation style `{0}` (expected apa, mla, chicago or ieee)")]
    UnknownStyle(String),
}
