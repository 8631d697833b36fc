//! Loading and checking converted document files.

use std::path::{Path, PathBuf};

use scholarlink_core::Enrichment;
use thiserror::Error;

use crate::IngestError;

/// Fewer words than this is not a document worth processing.
pub const MIN_WORDS: usize = 10;

const EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentIssue {
    #[error("file not found")]
    NotFound,
    #[error("unsupported file type `{0}` (expected .txt or .md)")]
    UnsupportedExtension(String),
    #[error("file is empty")]
    Empty,
    #[error("content contains only whitespace")]
    WhitespaceOnly,
    #[error("file is not valid UTF-8")]
    NotUtf8,
    #[error("content too short ({words} words, minimum {min})", min = MIN_WORDS)]
    TooShort { words: usize },
    #[error("document id `{0}` appears more than once in the batch")]
    DuplicateId(String),
}

fn rejected(path: &Path, issue: DocumentIssue) -> IngestError {
    IngestError::Validation {
        doc: path.display().to_string(),
        issue,
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Check text content before processing.
pub fn validate_content(text: &str) -> Result<(), DocumentIssue> {
    if text.is_empty() {
        return Err(DocumentIssue::Empty);
    }
    if text.trim().is_empty() {
        return Err(DocumentIssue::WhitespaceOnly);
    }
    let words = text.split_whitespace().count();
    if words < MIN_WORDS {
        return Err(DocumentIssue::TooShort { words });
    }
    Ok(())
}

/// Read a `.txt` or `.md` document, rejecting missing, empty, non-UTF-8 or
/// too-short files.
pub fn load_document(path: &Path) -> Result<String, IngestError> {
    if !path.exists() {
        return Err(rejected(path, DocumentIssue::NotFound));
    }
    if !has_supported_extension(path) {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Err(rejected(path, DocumentIssue::UnsupportedExtension(ext)));
    }
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|_| rejected(path, DocumentIssue::NotUtf8))?;
    validate_content(&text).map_err(|issue| rejected(path, issue))?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "loaded document");
    Ok(text)
}

/// Document id for a file: its stem (`paper.md` -> `paper`).
pub fn doc_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Supported documents under `dir`, recursively, sorted by path.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if has_supported_extension(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// One raw reference per non-blank line.
pub fn load_reference_list(path: &Path) -> Result<Vec<String>, IngestError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// An [`Enrichment`] record stored as JSON.
pub fn load_enrichment(path: &Path) -> Result<Enrichment, IngestError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| IngestError::Metadata(e.into()))
}
