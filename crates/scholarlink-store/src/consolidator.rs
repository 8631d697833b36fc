//! The consolidated metadata store: one JSON object mapping document ids to
//! their latest metadata.
//!
//! Every write goes to a temporary file in the store's directory, is synced,
//! and then renamed over the store. Writers hold [`StoreLock`] for the whole
//! read-modify-write; readers take no lock.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use scholarlink_core::{AcademicMetadata, Equation};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::StoreError;
use crate::lock::StoreLock;
use crate::summary::{
    EquationReference, NetworkEdge, StoreStats, citation_network, equation_references,
    store_stats,
};

/// One document's entry in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub metadata: AcademicMetadata,
    /// Extracted equations with type, symbols and context. Absent for
    /// entries written from metadata alone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equation_details: Vec<Equation>,
    /// When this metadata was last written (RFC 3339).
    pub processed_at: DateTime<Utc>,
}

/// Document id to entry, sorted by id.
pub type Store = BTreeMap<String, StoredDocument>;

/// What an update did to the store file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Inserted,
    Replaced,
    /// Stored metadata was already equal; the file was not rewritten.
    Unchanged,
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Create the store as `{}` when it does not exist.
///
/// Returns `true` when a new file was created. An existing store is left
/// untouched, whatever its contents.
pub fn initialize_consolidated_json(path: &Path) -> Result<bool, StoreError> {
    ensure_parent(path)?;
    let _lock = StoreLock::acquire(path)?;
    if path.exists() {
        tracing::debug!(path = %path.display(), "store already exists");
        return Ok(false);
    }
    write_store(path, &Store::new())?;
    tracing::info!(path = %path.display(), "initialized metadata store");
    Ok(true)
}

/// Read the store. A missing or blank file is an empty store. An entry whose
/// citations point past its references is [`StoreError::InvalidEntry`].
pub fn load_store(path: &Path) -> Result<Store, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Store::new()),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        tracing::warn!(path = %path.display(), "store file is empty, treating as no documents");
        return Ok(Store::new());
    }
    let store: Store = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    for (doc_id, doc) in &store {
        doc.metadata
            .check_citations()
            .map_err(|source| StoreError::InvalidEntry {
                path: path.to_path_buf(),
                doc_id: doc_id.clone(),
                source,
            })?;
    }
    Ok(store)
}

/// Set `doc_id`'s entry to `metadata`.
///
/// Other documents are never touched. When the stored metadata is already
/// equal, nothing is written so repeated updates leave the file
/// byte-identical. A corrupt store is reported and left as it is.
pub fn update_document_metadata(
    path: &Path,
    doc_id: &str,
    metadata: &AcademicMetadata,
) -> Result<UpdateOutcome, StoreError> {
    update_document_record(path, doc_id, metadata, &[])
}

/// [`update_document_metadata`] that also keeps the document's detailed
/// equations for [`equation_references`].
pub fn update_document_record(
    path: &Path,
    doc_id: &str,
    metadata: &AcademicMetadata,
    equations: &[Equation],
) -> Result<UpdateOutcome, StoreError> {
    ensure_parent(path)?;
    let _lock = StoreLock::acquire(path)?;
    let mut store = load_store(path)?;

    let outcome = match store.get(doc_id) {
        Some(existing)
            if existing.metadata == *metadata && existing.equation_details == equations =>
        {
            tracing::debug!(doc_id, "metadata unchanged, skipping write");
            return Ok(UpdateOutcome::Unchanged);
        }
        Some(_) => UpdateOutcome::Replaced,
        None => UpdateOutcome::Inserted,
    };

    store.insert(
        doc_id.to_string(),
        StoredDocument {
            metadata: metadata.clone(),
            equation_details: equations.to_vec(),
            processed_at: Utc::now(),
        },
    );
    write_store(path, &store)?;
    tracing::info!(
        doc_id,
        path = %path.display(),
        documents = store.len(),
        outcome = ?outcome,
        "updated document metadata"
    );
    Ok(outcome)
}

/// Remove `doc_id`'s entry. Returns whether an entry was removed; an absent
/// id is a no-op and writes nothing.
pub fn remove_document_metadata(path: &Path, doc_id: &str) -> Result<bool, StoreError> {
    if !path.exists() {
        return Ok(false);
    }
    let _lock = StoreLock::acquire(path)?;
    let mut store = load_store(path)?;
    if store.remove(doc_id).is_none() {
        tracing::debug!(doc_id, "document not in store");
        return Ok(false);
    }
    write_store(path, &store)?;
    tracing::info!(doc_id, path = %path.display(), "removed document metadata");
    Ok(true)
}

fn serialize(store: &Store) -> Result<Vec<u8>, StoreError> {
    let mut bytes = serde_json::to_vec_pretty(store).map_err(StoreError::Serialize)?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_store(path: &Path, store: &Store) -> Result<(), StoreError> {
    write_atomic(path, &serialize(store)?, |_| Ok(()))
}

/// Write `bytes` to a temp file beside `path`, sync it, then rename it over
/// `path`. `before_replace` runs after the sync; an error from it aborts the
/// write and the temp file is removed.
pub(crate) fn write_atomic(
    path: &Path,
    bytes: &[u8],
    before_replace: impl FnOnce(&Path) -> io::Result<()>,
) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    before_replace(tmp.path())?;
    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// A store bound to one path.
#[derive(Debug, Clone)]
pub struct MetadataConsolidator {
    path: PathBuf,
}

impl MetadataConsolidator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn initialize(&self) -> Result<bool, StoreError> {
        initialize_consolidated_json(&self.path)
    }

    pub fn update(&self, doc_id: &str, metadata: &AcademicMetadata) -> Result<UpdateOutcome, StoreError> {
        update_document_metadata(&self.path, doc_id, metadata)
    }

    pub fn update_with_equations(
        &self,
        doc_id: &str,
        metadata: &AcademicMetadata,
        equations: &[Equation],
    ) -> Result<UpdateOutcome, StoreError> {
        update_document_record(&self.path, doc_id, metadata, equations)
    }

    pub fn remove(&self, doc_id: &str) -> Result<bool, StoreError> {
        remove_document_metadata(&self.path, doc_id)
    }

    pub fn load(&self) -> Result<Store, StoreError> {
        load_store(&self.path)
    }

    pub fn get(&self, doc_id: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.load()?.remove(doc_id))
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(store_stats(&self.load()?))
    }

    pub fn citation_network(&self) -> Result<Vec<NetworkEdge>, StoreError> {
        Ok(citation_network(&self.load()?))
    }

    pub fn equation_references(&self) -> Result<Vec<EquationReference>, StoreError> {
        Ok(equation_references(&self.load()?))
    }
}
