//! Sequential batch processing into a metadata store.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;

use scholarlink_store::{MetadataConsolidator, UpdateOutcome};

use crate::IngestError;
use crate::document::{DocumentIssue, doc_id_for, load_document};
use crate::pipeline::{DocumentInput, DocumentWarnings, Pipeline};

/// Reported after each document, whether it succeeded or failed.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress<'a> {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
    pub doc_id: &'a str,
}

/// What to do when a document fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop at the first failure.
    Abort,
    /// Record the failure and continue.
    #[default]
    Skip,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: Vec<(String, UpdateOutcome, DocumentWarnings)>,
    pub failed: Vec<(String, IngestError)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.processed.len() + self.failed.len()
    }

    /// Documents whose stored entry was inserted or replaced.
    pub fn written(&self) -> usize {
        self.processed
            .iter()
            .filter(|(_, outcome, _)| *outcome != UpdateOutcome::Unchanged)
            .count()
    }
}

fn process_one(
    pipeline: &Pipeline,
    store: &MetadataConsolidator,
    doc_id: &str,
    path: &std::path::Path,
) -> Result<(UpdateOutcome, DocumentWarnings), IngestError> {
    let text = load_document(path)?;
    let outcome = pipeline.process(DocumentInput::new(doc_id, text))?;
    let update = store.update_with_equations(doc_id, &outcome.metadata, &outcome.equations)?;
    Ok((update, outcome.warnings))
}

/// Process `paths` one after another, writing each result to `store`.
///
/// Document ids come from file stems; two paths with the same stem are both
/// rejected before anything is processed. `on_progress` runs after every
/// document and can stop the batch by returning an error, which surfaces as
/// [`IngestError::Aborted`]. Documents already written stay in the store.
pub fn run_batch<E: Display>(
    pipeline: &Pipeline,
    store: &MetadataConsolidator,
    paths: &[PathBuf],
    policy: ErrorPolicy,
    mut on_progress: impl FnMut(BatchProgress<'_>) -> Result<(), E>,
) -> Result<BatchReport, IngestError> {
    let total = paths.len();
    let mut report = BatchReport::default();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for path in paths {
        *counts.entry(doc_id_for(path)).or_default() += 1;
    }

    for (i, path) in paths.iter().enumerate() {
        let doc_id = doc_id_for(path);

        let result = if counts.get(&doc_id).copied().unwrap_or(0) > 1 {
            Err(IngestError::Validation {
                doc: path.display().to_string(),
                issue: DocumentIssue::DuplicateId(doc_id.clone()),
            })
        } else {
            process_one(pipeline, store, &doc_id, path)
        };

        match result {
            Ok((outcome, warnings)) => report.processed.push((doc_id.clone(), outcome, warnings)),
            Err(e) => {
                tracing::warn!(doc_id = %doc_id, path = %path.display(), error = %e, "document failed");
                if policy == ErrorPolicy::Abort {
                    return Err(e);
                }
                report.failed.push((doc_id.clone(), e));
            }
        }

        let completed = i + 1;
        let progress = BatchProgress {
            completed,
            total,
            percent: completed as f64 * 100.0 / total as f64,
            doc_id: &doc_id,
        };
        if let Err(e) = on_progress(progress) {
            return Err(IngestError::Aborted {
                completed,
                total,
                reason: e.to_string(),
            });
        }
    }

    tracing::info!(
        total,
        processed = report.processed.len(),
        written = report.written(),
        failed = report.failed.len(),
        "batch complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const BODY: &str = "A short study of citation linking [1] written for the batch tests here.";

    fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, Vec<PathBuf>, MetadataConsolidator) {
        let dir = tempfile::tempdir().unwrap();
        let paths = files
            .iter()
            .map(|(name, content)| {
                let path = dir.path().join(name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).unwrap();
                }
                std::fs::write(&path, content).unwrap();
                path
            })
            .collect();
        let store = MetadataConsolidator::new(dir.path().join("store").join("metadata.json"));
        (dir, paths, store)
    }

    #[test]
    fn test_progress_reported_per_document() {
        let (_dir, paths, store) = setup(&[("a.txt", BODY), ("b.md", BODY)]);
        let mut seen = Vec::new();
        let report = run_batch(&Pipeline::default(), &store, &paths, ErrorPolicy::Skip, |p| {
            seen.push((p.completed, p.total, p.percent, p.doc_id.to_string()));
            Ok::<_, Infallible>(())
        })
        .unwrap();

        assert_eq!(report.processed.len(), 2);
        assert_eq!(
            seen,
            vec![(1, 2, 50.0, "a".to_string()), (2, 2, 100.0, "b".to_string())]
        );
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn test_skip_policy_records_failures() {
        let (_dir, paths, store) = setup(&[("bad.txt", "tiny"), ("good.txt", BODY)]);
        let report = run_batch(&Pipeline::default(), &store, &paths, ErrorPolicy::Skip, |_| {
            Ok::<_, Infallible>(())
        })
        .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
        assert_eq!(report.processed[0].0, "good");
        assert_eq!(report.total(), 2);
    }

    #[test]
    fn test_abort_policy_stops() {
        let (_dir, paths, store) = setup(&[("bad.txt", "tiny"), ("good.txt", BODY)]);
        let mut calls = 0;
        let err = run_batch(&Pipeline::default(), &store, &paths, ErrorPolicy::Abort, |_| {
            calls += 1;
            Ok::<_, Infallible>(())
        })
        .unwrap_err();
        assert!(matches!(err, IngestError::Validation { .. }));
        assert_eq!(calls, 0);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_callback_error_aborts() {
        let (_dir, paths, store) = setup(&[("a.txt", BODY), ("b.txt", BODY)]);
        let err = run_batch(&Pipeline::default(), &store, &paths, ErrorPolicy::Skip, |p| {
            if p.completed == 1 { Err("cancelled") } else { Ok(()) }
        })
        .unwrap_err();
        match err {
            IngestError::Aborted { completed, total, reason } => {
                assert_eq!((completed, total), (1, 2));
                assert_eq!(reason, "cancelled");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.load().unwrap().keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let (_dir, paths, store) =
            setup(&[("x/paper.txt", BODY), ("y/paper.md", BODY), ("other.txt", BODY)]);
        let report = run_batch(&Pipeline::default(), &store, &paths, ErrorPolicy::Skip, |_| {
            Ok::<_, Infallible>(())
        })
        .unwrap();
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed.iter().all(|(_, e)| matches!(
            e,
            IngestError::Validation { issue: DocumentIssue::DuplicateId(id), .. } if id == "paper"
        )));
        assert_eq!(store.load().unwrap().keys().collect::<Vec<_>>(), vec!["other"]);
    }

    #[test]
    fn test_empty_batch() {
        let (_dir, _, store) = setup(&[]);
        let report = run_batch(&Pipeline::default(), &store, &[], ErrorPolicy::Skip, |_| {
            Ok::<_, Infallible>(())
        })
        .unwrap();
        assert_eq!(report.total(), 0);
    }
}
