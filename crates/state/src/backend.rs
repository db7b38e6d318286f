use ahash::{AHashMap, AHashSet};

use edgecut_core::{Edge, Partition, PartitionId, Result, Vertex, VertexId};

/// A pluggable store for the partitioner's shared state: the input edge set,
/// per-vertex degree/membership, and the `k` output partitions.
///
/// Every method is value-semantic: readers get owned copies, writers hand
/// over owned deltas. No implementation may hand out a reference a caller
/// could mutate behind another worker's back — workers on different threads
/// must never see each other's in-flight edits (spec §5).
///
/// `get_*`/`put_*` are what a window commit calls each cycle; `get_edge` is
/// the streaming pull every worker races on; `crash`/`recover`/`is_crashed`/
/// `check_crashed` implement the optional crash-drill protocol (spec §4.C).
pub trait StateBackend: Send + Sync {
    /// The full edge set observed so far. In lazy-load mode this grows as
    /// `get_edge` discovers new lines; in eager mode it is complete from the
    /// start.
    fn get_edges(&self) -> AHashSet<Edge>;

    /// `get_edges().len()` without materializing the set.
    fn edges_size(&self) -> usize;

    /// A snapshot of every vertex's current degree and partition membership.
    fn get_verts(&self) -> AHashMap<VertexId, Vertex>;

    /// A snapshot restricted to `subset`. Vertices not yet known to the
    /// backend are simply absent from the result.
    fn get_verts_subset(&self, subset: &AHashSet<VertexId>) -> AHashMap<VertexId, Vertex>;

    /// A snapshot of all `k` partitions, indexed by `PartitionId`.
    fn get_parts(&self) -> Vec<Partition>;

    /// Merges a worker's vertex deltas into the authoritative copy. Each
    /// delta's `delta_deg` is added to the target's `deg` and its `parts` are
    /// unioned in, then the delta is discarded (see
    /// [`edgecut_core::Vertex::merge_delta`]).
    fn put_verts(&self, delta: AHashMap<VertexId, Vertex>);

    /// Merges `delta`'s edges into partition `i`.
    fn put_part(&self, i: PartitionId, delta: &Partition);

    /// Merges a full `k`-length vector of deltas, one per partition.
    ///
    /// # Errors
    ///
    /// Returns [`edgecut_core::Error::PartitionCountMismatch`] if `delta.len()`
    /// does not match the backend's `k`.
    fn put_parts(&self, delta: &[Partition]) -> Result<()>;

    /// Pulls the next not-yet-claimed edge from the input stream, or `None`
    /// once every edge has been handed out. Safe to call from any number of
    /// threads concurrently: each edge is returned to exactly one caller.
    fn get_edge(&self) -> Option<Edge>;

    /// `true` while a crash drill is in progress (spec §4.C). Backends that
    /// never crash always return `false`.
    fn is_crashed(&self) -> bool {
        false
    }

    /// Cooperatively blocks until `is_crashed()` is `false`. Callers that
    /// want to pause around a crash window (rather than discover torn state
    /// mid-operation) should call this before issuing other backend calls.
    fn check_crashed(&self) {}
}
