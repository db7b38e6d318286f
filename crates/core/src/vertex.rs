use ahash::AHashSet;

use crate::edge::PartitionId;

/// Per-vertex state tracked by the state backend.
///
/// `deg` is the authoritative, globally observed degree; it only ever grows.
/// `delta_deg` is scratch space used by a worker's local copy to carry its
/// own increment back to the backend at publish time — it has no meaning on
/// the backend's authoritative copy and is always `0` there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    pub deg: i64,
    pub delta_deg: i64,
    pub parts: AHashSet<PartitionId>,
}

impl Vertex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that this vertex has an edge in partition `p`. Idempotent.
    pub fn add_part(&mut self, p: PartitionId) {
        self.parts.insert(p);
    }

    /// The replication factor contribution of this single vertex: the
    /// number of partitions it currently touches.
    pub fn replication(&self) -> usize {
        self.parts.len()
    }

    /// Merges another vertex's delta into `self`: adds `delta_deg` to `deg`
    /// and unions `parts`. Used by [`crate::Vertex::merge_delta`] callers in
    /// the state backend's `put_verts`. Idempotent only if `other.delta_deg`
    /// is zeroed between applications — see [`Vertex::take_delta`].
    pub fn merge_delta(&mut self, other: &Vertex) {
        self.deg += other.delta_deg;
        for &p in &other.parts {
            self.parts.insert(p);
        }
    }

    /// Consumes and clears this vertex's `delta_deg`, returning the prior
    /// value. Workers must call this right after a successful publish so a
    /// delta is single-use — otherwise a retried or duplicated publish would
    /// double-count the degree increment.
    pub fn take_delta(&mut self) -> i64 {
        std::mem::take(&mut self.delta_deg)
    }
}
