use ahash::AHashSet;

use crate::edge::{Edge, VertexId};

/// The set of edges assigned to a single partition.
///
/// `add_edge` must stay idempotent: re-inserting an edge that is already
/// present is a no-op, which is what lets concurrent workers merge stale
/// deltas without corrupting state (see spec invariant I2, Idempotence).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Partition {
    pub edges: AHashSet<Edge>,
}

impl Partition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `e`. Returns `true` if the edge was not already present.
    pub fn add_edge(&mut self, e: Edge) -> bool {
        self.edges.insert(e)
    }

    /// Unions another partition's edges into this one.
    pub fn merge(&mut self, other: &Partition) {
        for &e in &other.edges {
            self.edges.insert(e);
        }
    }

    pub fn contains(&self, e: &Edge) -> bool {
        self.edges.contains(e)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The distinct vertices touched by this partition's edges.
    pub fn vertices(&self) -> AHashSet<VertexId> {
        let mut vs = AHashSet::with_capacity(self.edges.len() * 2);
        for e in &self.edges {
            vs.insert(e.u);
            vs.insert(e.v);
        }
        vs
    }
}
