//! Parent/child adjacency between puffs.
//!
//! Every puff that lists a parent P gets two edges: `parent` from the puff
//! to P and `child` from P to the puff. Vertices are created on demand for
//! parents that are not known locally yet. Edges are never removed.

use super::puff::Shell;
use crate::dag::ContentHash;
use std::collections::HashMap;
use tracing::debug;

/// Label of a familial edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeLabel {
    Parent,
    Child,
}

#[derive(Debug, Default, Clone)]
struct Adjacency {
    parents: Vec<ContentHash>,
    children: Vec<ContentHash>,
}

impl Adjacency {
    fn out(&self, label: EdgeLabel) -> &[ContentHash] {
        match label {
            EdgeLabel::Parent => &self.parents,
            EdgeLabel::Child => &self.children,
        }
    }

    fn out_mut(&mut self, label: EdgeLabel) -> &mut Vec<ContentHash> {
        match label {
            EdgeLabel::Parent => &mut self.parents,
            EdgeLabel::Child => &mut self.children,
        }
    }
}

/// Adjacency lists keyed by sig.
#[derive(Debug, Default, Clone)]
pub struct FamilyGraph {
    vertices: HashMap<ContentHash, Adjacency>,
    edge_count: usize,
}

impl FamilyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex for `sig` if it does not exist yet.
    pub fn ensure_vertex(&mut self, sig: ContentHash) {
        self.vertices.entry(sig).or_default();
    }

    pub fn has_vertex(&self, sig: &ContentHash) -> bool {
        self.vertices.contains_key(sig)
    }

    /// Adds an edge. Not idempotent: adding the same edge twice stores it twice.
    pub fn add_edge(&mut self, label: EdgeLabel, from: ContentHash, to: ContentHash) {
        self.ensure_vertex(to);
        self.vertices
            .entry(from)
            .or_default()
            .out_mut(label)
            .push(to);
        self.edge_count += 1;
    }

    /// Targets of the outgoing `label` edges of `sig`.
    pub fn out_edges(&self, sig: &ContentHash, label: EdgeLabel) -> &[ContentHash] {
        self.vertices
            .get(sig)
            .map_or(&[][..], |adjacency| adjacency.out(label))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Links every shell to its parents. Safe to repeat: parents that a shell
    /// is already linked to are skipped.
    ///
    /// Returns the number of edges added.
    pub fn materialize_familial_edges<'a>(
        &mut self,
        shells: impl IntoIterator<Item = &'a Shell>,
    ) -> usize {
        let before = self.edge_count;

        for shell in shells {
            self.ensure_vertex(shell.sig);
            let existing = self.out_edges(&shell.sig, EdgeLabel::Parent).to_vec();

            for parent in &shell.payload.parents {
                if existing.contains(parent) {
                    continue;
                }
                self.ensure_vertex(*parent);
                self.add_edge(EdgeLabel::Parent, shell.sig, *parent);
                self.add_edge(EdgeLabel::Child, *parent, shell.sig);
            }
        }

        let added = self.edge_count - before;
        if added > 0 {
            debug!(added = added, total = self.edge_count, "familial edges added");
        }
        added
    }

    /// Number of outgoing `parent` edges; 0 for unknown or absent sigs.
    pub fn count_parents(&self, sig: Option<&ContentHash>) -> usize {
        sig.map_or(0, |sig| self.out_edges(sig, EdgeLabel::Parent).len())
    }

    /// Number of outgoing `child` edges; 0 for unknown or absent sigs.
    pub fn count_children(&self, sig: Option<&ContentHash>) -> usize {
        sig.map_or(0, |sig| self.out_edges(sig, EdgeLabel::Child).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::puff::Payload;

    fn sig(n: u8) -> ContentHash {
        ContentHash::of_bytes(&[n])
    }

    fn create_test_shell(n: u8, parents: &[u8]) -> Shell {
        let mut payload = Payload::new("text", "");
        payload.content = None;
        payload.parents = parents.iter().map(|p| sig(*p)).collect();
        Shell {
            sig: sig(n),
            username: "alice".to_string(),
            routes: Vec::new(),
            payload,
        }
    }

    #[test]
    fn test_add_edge_is_not_idempotent() {
        let mut graph = FamilyGraph::new();
        graph.add_edge(EdgeLabel::Parent, sig(1), sig(2));
        graph.add_edge(EdgeLabel::Parent, sig(1), sig(2));

        assert_eq!(graph.out_edges(&sig(1), EdgeLabel::Parent).len(), 2);
        assert_eq!(graph.vertex_count(), 2);
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let mut graph = FamilyGraph::new();
        let shells = vec![
            create_test_shell(1, &[]),
            create_test_shell(2, &[1]),
            create_test_shell(3, &[1, 2]),
        ];

        assert_eq!(graph.materialize_familial_edges(&shells), 6);
        let counts = |g: &FamilyGraph| {
            (1u8..=3)
                .map(|n| (g.count_parents(Some(&sig(n))), g.count_children(Some(&sig(n)))))
                .collect::<Vec<_>>()
        };
        let first = counts(&graph);

        for _ in 0..3 {
            assert_eq!(graph.materialize_familial_edges(&shells), 0);
        }
        assert_eq!(counts(&graph), first);
        assert_eq!(first, vec![(0, 2), (1, 1), (2, 0)]);
    }

    #[test]
    fn test_unknown_parent_gets_placeholder_vertex() {
        let mut graph = FamilyGraph::new();
        graph.materialize_familial_edges(&[create_test_shell(2, &[9])]);

        assert!(graph.has_vertex(&sig(9)));
        assert_eq!(graph.count_children(Some(&sig(9))), 1);
    }

    #[test]
    fn test_counts_for_unknown_or_absent() {
        let graph = FamilyGraph::new();
        assert_eq!(graph.count_parents(None), 0);
        assert_eq!(graph.count_children(Some(&sig(7))), 0);
    }
}
