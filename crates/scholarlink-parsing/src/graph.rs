//! Citation graph built on demand from citation links.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use scholarlink_core::{CitationLink, Reference};
use serde::{Deserialize, Serialize};

pub const ROOT_ID: &str = "doc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Document,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    /// Index into the document's reference list; `None` for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<usize>,
    pub label: String,
    /// Number of resolved links pointing at this node.
    pub citation_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Document root to a cited reference.
    Cites,
    /// Two references cited close together. Undirected.
    CoCited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub weight: usize,
}

/// Nodes and edges of a document's citation graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub fn reference_id(index: usize) -> String {
    format!("ref:{index}")
}

/// Character span of a link's context within its paragraph.
fn context_span(link: &CitationLink, window: usize) -> (usize, usize) {
    let start = link.location.offset - window.min(link.location.offset);
    (start, start + link.context.chars().count())
}

impl CitationGraph {
    /// Build the graph for `links` over `references`.
    ///
    /// Only resolved links contribute. Nodes are ordered root first, then by
    /// reference index; edges are ordered `cites` first, then co-citations
    /// by `(source, target)` index.
    pub fn build(
        links: &[CitationLink],
        references: &[Reference],
        window: usize,
        include_root: bool,
    ) -> Self {
        let resolved: Vec<(&CitationLink, usize)> = links
            .iter()
            .filter_map(|l| l.reference.filter(|&i| i < references.len()).map(|i| (l, i)))
            .collect();

        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &(_, index) in &resolved {
            *counts.entry(index).or_default() += 1;
        }

        let mut graph = CitationGraph::default();
        if include_root {
            graph.nodes.push(GraphNode {
                id: ROOT_ID.to_string(),
                kind: NodeKind::Document,
                reference: None,
                label: "document".to_string(),
                citation_count: 0,
            });
        }
        for (&index, &count) in &counts {
            graph.nodes.push(GraphNode {
                id: reference_id(index),
                kind: NodeKind::Reference,
                reference: Some(index),
                label: references[index].label().to_string(),
                citation_count: count,
            });
            if include_root {
                graph.edges.push(GraphEdge {
                    source: ROOT_ID.to_string(),
                    target: reference_id(index),
                    kind: EdgeKind::Cites,
                    weight: count,
                });
            }
        }

        let mut pairs: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        for (i, &(a, ra)) in resolved.iter().enumerate() {
            let span_a = context_span(a, window);
            for &(b, rb) in &resolved[i + 1..] {
                if ra == rb || a.location.paragraph != b.location.paragraph {
                    continue;
                }
                let span_b = context_span(b, window);
                if span_a.0 < span_b.1 && span_b.0 < span_a.1 {
                    *pairs.entry((ra.min(rb), ra.max(rb))).or_default() += 1;
                }
            }
        }
        graph
            .edges
            .extend(pairs.into_iter().map(|((lo, hi), weight)| GraphEdge {
                source: reference_id(lo),
                target: reference_id(hi),
                kind: EdgeKind::CoCited,
                weight,
            }));

        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "built citation graph"
        );
        graph
    }

    pub fn reference_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Reference)
    }

    pub fn co_citation_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(|e| e.kind == EdgeKind::CoCited)
    }

    /// Render as a Graphviz digraph. Co-citation edges are drawn undirected.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph citations {\n    node [shape=box];\n");
        for node in &self.nodes {
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\"];",
                escape_dot(&node.id),
                escape_dot(&node.label)
            );
        }
        for edge in &self.edges {
            let attrs = match edge.kind {
                EdgeKind::Cites => format!("label=\"{}\"", edge.weight),
                EdgeKind::CoCited => format!("dir=none, style=dashed, label=\"{}\"", edge.weight),
            };
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\" [{}];",
                escape_dot(&edge.source),
                escape_dot(&edge.target),
                attrs
            );
        }
        out.push_str("}\n");
        out
    }
}

/// Contexts of every resolved link, grouped by reference index.
pub fn contexts_by_reference(links: &[CitationLink]) -> BTreeMap<usize, Vec<String>> {
    let mut map: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for link in links {
        if let Some(index) = link.reference {
            map.entry(index).or_default().push(link.context.clone());
        }
    }
    map
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarlink_core::{CitationLocation, CitationType};

    fn link(reference: Option<usize>, paragraph: usize, offset: usize, context: &str) -> CitationLink {
        CitationLink {
            citation_text: "[x]".into(),
            citation_type: CitationType::Numeric,
            reference,
            context: context.into(),
            location: CitationLocation { paragraph, offset },
        }
    }

    fn refs(n: usize) -> Vec<Reference> {
        (0..n).map(|i| Reference::new(format!("Ref {i}"))).collect()
    }

    #[test]
    fn test_root_and_cites_edges() {
        let links = vec![link(Some(1), 0, 0, "[2]"), link(Some(1), 3, 0, "[2]")];
        let g = CitationGraph::build(&links, &refs(2), 10, true);
        assert_eq!(g.nodes.len(), 2);
        assert_eq!(g.nodes[0].id, ROOT_ID);
        assert_eq!(g.nodes[1].citation_count, 2);
        assert_eq!(g.edges.len(), 1);
        assert_eq!(g.edges[0].kind, EdgeKind::Cites);
        assert_eq!(g.edges[0].weight, 2);
    }

    #[test]
    fn test_without_root() {
        let links = vec![link(Some(0), 0, 0, "[1]")];
        let g = CitationGraph::build(&links, &refs(1), 10, false);
        assert_eq!(g.nodes.len(), 1);
        assert!(g.edges.is_empty());
    }

    #[test]
    fn test_unresolved_and_dangling_ignored() {
        let links = vec![link(None, 0, 0, "[9]"), link(Some(5), 0, 0, "[6]")];
        let g = CitationGraph::build(&links, &refs(2), 10, true);
        assert_eq!(g.reference_nodes().count(), 0);
    }

    #[test]
    fn test_co_citation_requires_overlap() {
        // Window 5: spans [0, 8) and [15, 28) do not overlap.
        let far = vec![
            link(Some(0), 0, 0, "[1] abcd"),
            link(Some(1), 0, 20, "abcde[2] abcd"),
        ];
        assert_eq!(CitationGraph::build(&far, &refs(2), 5, false).co_citation_edges().count(), 0);

        // Spans [0, 8) and [5, 18) overlap.
        let near = vec![
            link(Some(1), 0, 0, "[2] abcd"),
            link(Some(0), 0, 10, "abcde[1] abcd"),
        ];
        let g = CitationGraph::build(&near, &refs(2), 5, false);
        let edges: Vec<_> = g.co_citation_edges().collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "ref:0");
        assert_eq!(edges[0].target, "ref:1");
        assert_eq!(edges[0].weight, 1);
    }

    #[test]
    fn test_co_citation_requires_same_paragraph() {
        let links = vec![link(Some(0), 0, 0, "[1]"), link(Some(1), 1, 0, "[2]")];
        let g = CitationGraph::build(&links, &refs(2), 100, false);
        assert_eq!(g.co_citation_edges().count(), 0);
    }

    #[test]
    fn test_same_reference_is_not_co_cited() {
        let links = vec![link(Some(0), 0, 0, "[1] [1]"), link(Some(0), 0, 4, "[1] [1]")];
        let g = CitationGraph::build(&links, &refs(1), 100, false);
        assert_eq!(g.co_citation_edges().count(), 0);
    }

    #[test]
    fn test_contexts_by_reference() {
        let links = vec![
            link(Some(1), 0, 0, "alpha"),
            link(None, 0, 0, "beta"),
            link(Some(1), 1, 0, "gamma"),
        ];
        let map = contexts_by_reference(&links);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&1], vec!["alpha", "gamma"]);
    }

    #[test]
    fn test_dot_output() {
        let links = vec![link(Some(0), 0, 0, "[1] [2]"), link(Some(1), 0, 4, "[1] [2]")];
        let references = vec![Reference::new("Say \"hi\""), Reference::new("Other")];
        let dot = CitationGraph::build(&links, &references, 100, true).to_dot();
        assert!(dot.starts_with("digraph citations {"));
        assert!(dot.contains("\"doc\" -> \"ref:0\""));
        assert!(dot.contains("\"ref:0\" -> \"ref:1\" [dir=none"));
        assert!(dot.contains("Say \\\"hi\\\""));
    }

    #[test]
    fn test_serializes_snake_case_kinds() {
        let links = vec![link(Some(0), 0, 0, "[1] [2]"), link(Some(1), 0, 4, "[1] [2]")];
        let g = CitationGraph::build(&links, &refs(2), 100, true);
        let json = serde_json::to_string(&g).unwrap();
        assert!(json.contains("\"co_cited\""));
        assert!(json.contains("\"document\""));
    }
}
