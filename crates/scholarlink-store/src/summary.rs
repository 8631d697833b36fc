//! Views computed from a loaded store. Nothing here is persisted.

use scholarlink_core::EquationType;
use serde::Serialize;

use crate::consolidator::Store;

/// Totals across every document in a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub references: usize,
    pub citations: usize,
    pub unresolved_citations: usize,
    pub equations: usize,
}

/// One resolved citation: a document citing a reference, with the text
/// around the citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkEdge {
    pub source: String,
    pub target: String,
    pub context: String,
}

/// An equation and the document it appears in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquationReference {
    pub document_id: String,
    pub equation: String,
    /// `None` when the entry was stored without equation details.
    pub equation_type: Option<EquationType>,
    pub context: Option<String>,
}

pub fn store_stats(store: &Store) -> StoreStats {
    store
        .values()
        .map(|doc| &doc.metadata)
        .fold(StoreStats::default(), |mut stats, m| {
            stats.documents += 1;
            stats.references += m.references.len();
            stats.citations += m.citations.len();
            stats.unresolved_citations += m.unresolved_citations().count();
            stats.equations += m.equations.len();
            stats
        })
}

/// Every resolved citation in the store, ordered by document id and then
/// citation order. Targets are reference labels (title, else raw text).
pub fn citation_network(store: &Store) -> Vec<NetworkEdge> {
    store
        .iter()
        .flat_map(|(doc_id, doc)| {
            let references = &doc.metadata.references;
            doc.metadata.citations.iter().filter_map(move |link| {
                link.resolved(references).map(|reference| NetworkEdge {
                    source: doc_id.clone(),
                    target: reference.label().to_string(),
                    context: link.context.clone(),
                })
            })
        })
        .collect()
}

/// Every equation in the store, ordered by document id and then position.
///
/// Entries with stored details contribute type and context; others fall
/// back to the bare equation strings in their metadata.
pub fn equation_references(store: &Store) -> Vec<EquationReference> {
    let mut out = Vec::new();
    for (doc_id, doc) in store {
        if doc.equation_details.is_empty() {
            out.extend(doc.metadata.equations.iter().map(|equation| EquationReference {
                document_id: doc_id.clone(),
                equation: equation.clone(),
                equation_type: None,
                context: None,
            }));
        } else {
            out.extend(doc.equation_details.iter().map(|equation| EquationReference {
                document_id: doc_id.clone(),
                equation: equation.raw_text.clone(),
                equation_type: Some(equation.equation_type),
                context: equation.context.clone(),
            }));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidator::StoredDocument;
    use chrono::Utc;
    use scholarlink_core::{
        AcademicMetadata, CitationLink, CitationLocation, CitationType, Equation, Reference,
    };

    fn link(reference: Option<usize>, context: &str) -> CitationLink {
        CitationLink {
            citation_text: "[1]".into(),
            citation_type: CitationType::Numeric,
            reference,
            context: context.into(),
            location: CitationLocation { paragraph: 0, offset: 0 },
        }
    }

    fn entry(citations: Vec<CitationLink>, equations: &[&str]) -> StoredDocument {
        let metadata = AcademicMetadata::builder()
            .title("T")
            .references(vec![Reference::new("Raw one").with_title("Paper One")])
            .citations(citations)
            .equations(equations.iter().copied())
            .build()
            .unwrap();
        StoredDocument {
            metadata,
            equation_details: Vec::new(),
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn test_stats_sum_documents() {
        let mut store = Store::new();
        store.insert("a".into(), entry(vec![link(Some(0), "x"), link(None, "y")], &["$x$"]));
        store.insert("b".into(), entry(vec![], &[]));
        assert_eq!(
            store_stats(&store),
            StoreStats {
                documents: 2,
                references: 2,
                citations: 2,
                unresolved_citations: 1,
                equations: 1,
            }
        );
    }

    #[test]
    fn test_empty_store_stats() {
        assert_eq!(store_stats(&Store::new()), StoreStats::default());
    }

    #[test]
    fn test_network_uses_labels_and_skips_unresolved() {
        let mut store = Store::new();
        store.insert("doc".into(), entry(vec![link(Some(0), "see [1]"), link(None, "?")], &[]));
        let network = citation_network(&store);
        assert_eq!(
            network,
            vec![NetworkEdge {
                source: "doc".into(),
                target: "Paper One".into(),
                context: "see [1]".into(),
            }]
        );
    }

    #[test]
    fn test_equation_references_prefer_details() {
        let mut store = Store::new();
        let mut detailed = entry(vec![], &["$$E=mc^2$$"]);
        detailed.equation_details = vec![Equation {
            raw_text: "$$E=mc^2$$".into(),
            symbols: Default::default(),
            equation_type: EquationType::Definition,
            context: Some("We define energy.".into()),
        }];
        store.insert("b".into(), detailed);
        store.insert("a".into(), entry(vec![], &["$x$"]));

        let equations = equation_references(&store);
        assert_eq!(equations.len(), 2);
        assert_eq!(equations[0].document_id, "a");
        assert_eq!(equations[0].equation_type, None);
        assert_eq!(equations[0].context, None);
        assert_eq!(equations[1].document_id, "b");
        assert_eq!(equations[1].equation_type, Some(EquationType::Definition));
        assert_eq!(equations[1].context.as_deref(), Some("We define energy."));
    }
}
