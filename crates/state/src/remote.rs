use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use edgecut_core::{Edge, Error, Partition, PartitionId, Result, Vertex, VertexId};

use crate::backend::StateBackend;

/// The handful of key-value verbs the remote backend needs (spec §6): set
/// membership, set scan, an integer counter, and a scalar get. The wire
/// protocol and connection management are deliberately out of scope — any
/// client (a Redis driver, an HTTP shim, a test double) that speaks these
/// verbs can back a [`RemoteBackend`].
pub trait KvClient: Send + Sync {
    fn sadd(&self, key: &str, member: &str) -> Result<()>;
    fn smembers(&self, key: &str) -> Result<Vec<String>>;
    fn scard(&self, key: &str) -> Result<usize>;
    /// Cursor-based set scan, Redis `SSCAN`-style: returns the next cursor
    /// (`0` once exhausted) and a page of members.
    fn sscan(&self, key: &str, cursor: u64) -> Result<(u64, Vec<String>)>;
    fn incrby(&self, key: &str, delta: i64) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn flushall(&self) -> Result<()>;
}

fn part_key(i: PartitionId) -> String {
    format!("P{i}")
}

fn deg_key(v: VertexId) -> String {
    format!("VD{v}")
}

fn parts_key(v: VertexId) -> String {
    format!("VP{v}")
}

struct ScanState {
    cursor: u64,
    buffer: VecDeque<String>,
    exhausted: bool,
}

/// A state backend addressed through a key-value store, using the
/// conventions from spec §6:
///
/// - `E`: the set of every edge seen, `"u,v"` strings.
/// - `Pi`: the set of edges assigned to partition `i`.
/// - `V`: the set of every vertex id observed.
/// - `VDv`: an integer counter, the degree of vertex `v`.
/// - `VPv`: the set of partition ids vertex `v` touches.
///
/// Does not support the crash-drill protocol — `is_crashed`/`check_crashed`
/// use the trait's always-false defaults, matching a store that has no
/// concept of this process's in-memory state to lose.
pub struct RemoteBackend<C: KvClient> {
    client: C,
    k: usize,
    scan: Mutex<ScanState>,
}

impl<C: KvClient> RemoteBackend<C> {
    /// Connects to `client` and flushes it (spec §6: `FLUSHALL` at startup),
    /// so a run never reads `E`/`Pi`/`VDv` state left behind by a previous
    /// run against the same store.
    pub fn new(client: C, k: usize) -> Result<Self> {
        client.flushall()?;
        Ok(Self {
            client,
            k,
            scan: Mutex::new(ScanState {
                cursor: 0,
                buffer: VecDeque::new(),
                exhausted: false,
            }),
        })
    }

    fn read_vertex(&self, id: VertexId) -> Result<Option<Vertex>> {
        let deg = match self.client.get(&deg_key(id))? {
            Some(s) => s.parse::<i64>().unwrap_or(0),
            None => return Ok(None),
        };
        let parts = self
            .client
            .smembers(&parts_key(id))?
            .into_iter()
            .filter_map(|s| s.parse::<PartitionId>().ok())
            .collect::<AHashSet<_>>();
        Ok(Some(Vertex {
            deg,
            delta_deg: 0,
            parts,
        }))
    }
}

impl<C: KvClient> StateBackend for RemoteBackend<C> {
    fn get_edges(&self) -> AHashSet<Edge> {
        self.client
            .smembers("E")
            .unwrap_or_default()
            .iter()
            .filter_map(|s| Edge::from_kv_string(s))
            .collect()
    }

    fn edges_size(&self) -> usize {
        self.client.scard("E").unwrap_or(0)
    }

    fn get_verts(&self) -> AHashMap<VertexId, Vertex> {
        let ids = self.client.smembers("V").unwrap_or_default();
        let mut out = AHashMap::with_capacity(ids.len());
        for id in ids {
            let Ok(id) = id.parse::<VertexId>() else {
                continue;
            };
            if let Ok(Some(v)) = self.read_vertex(id) {
                out.insert(id, v);
            }
        }
        out
    }

    fn get_verts_subset(&self, subset: &AHashSet<VertexId>) -> AHashMap<VertexId, Vertex> {
        let mut out = AHashMap::with_capacity(subset.len());
        for &id in subset {
            if let Ok(Some(v)) = self.read_vertex(id) {
                out.insert(id, v);
            }
        }
        out
    }

    fn get_parts(&self) -> Vec<Partition> {
        (0..self.k)
            .map(|i| {
                let mut part = Partition::new();
                for s in self.client.smembers(&part_key(i)).unwrap_or_default() {
                    if let Some(edge) = Edge::from_kv_string(&s) {
                        part.add_edge(edge);
                    }
                }
                part
            })
            .collect()
    }

    fn put_verts(&self, delta: AHashMap<VertexId, Vertex>) {
        for (id, v) in delta {
            let _ = self.client.sadd("V", &id.to_string());
            if v.delta_deg != 0 {
                let _ = self.client.incrby(&deg_key(id), v.delta_deg);
            }
            for &p in &v.parts {
                let _ = self.client.sadd(&parts_key(id), &p.to_string());
            }
        }
    }

    fn put_part(&self, i: PartitionId, delta: &Partition) {
        for edge in &delta.edges {
            let s = edge.to_kv_string();
            let _ = self.client.sadd(&part_key(i), &s);
            let _ = self.client.sadd("E", &s);
        }
    }

    fn put_parts(&self, delta: &[Partition]) -> Result<()> {
        if delta.len() != self.k {
            return Err(Error::PartitionCountMismatch {
                expected: self.k,
                actual: delta.len(),
            });
        }
        for (i, d) in delta.iter().enumerate() {
            self.put_part(i, d);
        }
        Ok(())
    }

    fn get_edge(&self) -> Option<Edge> {
        let mut scan = self.scan.lock();
        loop {
            if let Some(s) = scan.buffer.pop_front() {
                if let Some(edge) = Edge::from_kv_string(&s) {
                    return Some(edge);
                }
                continue;
            }
            if scan.exhausted {
                return None;
            }
            let (next_cursor, page) = self.client.sscan("E", scan.cursor).ok()?;
            scan.cursor = next_cursor;
            scan.exhausted = next_cursor == 0 && page.is_empty();
            scan.buffer.extend(page);
            if scan.buffer.is_empty() && next_cursor == 0 {
                scan.exhausted = true;
                return None;
            }
        }
    }
}

/// An in-process [`KvClient`] test double: no network, no pagination (one
/// `SSCAN` page covers the whole set), but the same verb semantics.
#[derive(Default)]
pub struct InMemoryKvClient {
    sets: Mutex<AHashMap<String, Vec<String>>>,
    ints: Mutex<AHashMap<String, i64>>,
}

impl InMemoryKvClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvClient for InMemoryKvClient {
    fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut sets = self.sets.lock();
        let members = sets.entry(key.to_string()).or_default();
        if !members.iter().any(|m| m == member) {
            members.push(member.to_string());
        }
        Ok(())
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.sets.lock().get(key).cloned().unwrap_or_default())
    }

    fn scard(&self, key: &str) -> Result<usize> {
        Ok(self.sets.lock().get(key).map(Vec::len).unwrap_or(0))
    }

    fn sscan(&self, key: &str, _cursor: u64) -> Result<(u64, Vec<String>)> {
        Ok((0, self.smembers(key)?))
    }

    fn incrby(&self, key: &str, delta: i64) -> Result<()> {
        *self.ints.lock().entry(key.to_string()).or_insert(0) += delta;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.ints.lock().get(key).map(|v| v.to_string()))
    }

    fn flushall(&self) -> Result<()> {
        self.sets.lock().clear();
        self.ints.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get_edges_round_trip() {
        let backend = RemoteBackend::new(InMemoryKvClient::new(), 2).unwrap();
        let mut delta = Partition::new();
        delta.add_edge(Edge::new(1, 2));
        delta.add_edge(Edge::new(2, 3));
        backend.put_part(0, &delta);

        assert_eq!(backend.edges_size(), 2);
        let edges = backend.get_edges();
        assert!(edges.contains(&Edge::new(1, 2)));
        assert!(edges.contains(&Edge::new(2, 3)));

        let parts = backend.get_parts();
        assert_eq!(parts[0].len(), 2);
        assert!(parts[1].is_empty());
    }

    #[test]
    fn put_verts_accumulates_degree_and_parts() {
        let backend = RemoteBackend::new(InMemoryKvClient::new(), 2).unwrap();
        let mut delta = AHashMap::new();
        let mut v = Vertex::new();
        v.delta_deg = 3;
        v.add_part(1);
        delta.insert(7, v);
        backend.put_verts(delta);

        let verts = backend.get_verts();
        let v = verts.get(&7).unwrap();
        assert_eq!(v.deg, 3);
        assert!(v.parts.contains(&1));
    }

    #[test]
    fn get_edge_drains_the_edge_set_exactly_once() {
        let backend = RemoteBackend::new(InMemoryKvClient::new(), 1).unwrap();
        let mut delta = Partition::new();
        delta.add_edge(Edge::new(1, 2));
        delta.add_edge(Edge::new(3, 4));
        backend.put_part(0, &delta);

        let mut seen = AHashSet::new();
        while let Some(e) = backend.get_edge() {
            seen.insert(e);
        }
        assert_eq!(seen.len(), 2);
        assert!(backend.get_edge().is_none());
    }

    #[test]
    fn put_parts_rejects_wrong_length() {
        let backend = RemoteBackend::new(InMemoryKvClient::new(), 3).unwrap();
        let err = backend.put_parts(&[Partition::new()]).unwrap_err();
        assert!(matches!(
            err,
            Error::PartitionCountMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }
}
