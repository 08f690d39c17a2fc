//! Adjacency relations between neighbouring supervoxels.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Label-to-neighbour-labels multimap.
///
/// Every undirected adjacency appears under both endpoints; labels with
/// no neighbours have no entry. Sorted keys and values make iteration
/// deterministic.
pub type LabelAdjacency = BTreeMap<u32, BTreeSet<u32>>;

/// An undirected edge between two adjacent supervoxels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjacencyEdge {
    /// The two endpoint labels, smaller first.
    pub labels: (u32, u32),
    /// Weighted feature distance between the two cluster centroids.
    pub weight: f32,
}

/// Undirected weighted graph over supervoxel labels.
///
/// One vertex per label, one edge per unordered pair of adjacent
/// labels. Vertices are in label order; edges in ascending
/// (first, second) label order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjacencyGraph {
    nodes: Vec<u32>,
    edges: Vec<AdjacencyEdge>,
}

impl AdjacencyGraph {
    pub(crate) fn new(nodes: Vec<u32>, edges: Vec<AdjacencyEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Vertex labels in ascending order.
    #[inline]
    pub fn nodes(&self) -> &[u32] {
        &self.nodes
    }

    /// All edges, each unordered pair once.
    #[inline]
    pub fn edges(&self) -> &[AdjacencyEdge] {
        &self.edges
    }

    /// Number of vertices.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has a vertex for `label`.
    pub fn contains_node(&self, label: u32) -> bool {
        self.nodes.binary_search(&label).is_ok()
    }

    /// Weight of the edge between two labels, if they are adjacent.
    /// Endpoint order does not matter.
    pub fn edge_weight(&self, a: u32, b: u32) -> Option<f32> {
        let key = (a.min(b), a.max(b));
        self.edges
            .iter()
            .find(|e| e.labels == key)
            .map(|e| e.weight)
    }

    /// Labels adjacent to `label`, in ascending order.
    pub fn neighbors(&self, label: u32) -> Vec<u32> {
        let mut out: Vec<u32> = self
            .edges
            .iter()
            .filter_map(|e| {
                if e.labels.0 == label {
                    Some(e.labels.1)
                } else if e.labels.1 == label {
                    Some(e.labels.0)
                } else {
                    None
                }
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// Degree of a vertex.
    pub fn degree(&self, label: u32) -> usize {
        self.edges
            .iter()
            .filter(|e| e.labels.0 == label || e.labels.1 == label)
            .count()
    }
}
