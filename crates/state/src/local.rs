use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use bloomfilter::Bloom;
use parking_lot::{Condvar, Mutex, RwLock};

use edgecut_core::load::{load_edge_file, parse_edge_line};
use edgecut_core::{CrashMode, Edge, Error, MetricsSink, NoopMetricsSink, Partition, PartitionId, Result, Vertex, VertexId};

use crate::backend::StateBackend;
use crate::coprocess::CoprocessBackend;

/// Estimated edge count handed to the Bloom filter sizing in lazy-load mode.
/// A low false-positive rate here only costs an extra exact-set lookup; it
/// never affects correctness.
const LAZY_BLOOM_EXPECTED_EDGES: usize = 1 << 20;
const LAZY_BLOOM_FP_RATE: f64 = 0.01;

struct LazyLoader {
    reader: BufReader<File>,
    bloom: Bloom<Edge>,
    path: PathBuf,
    line_no: usize,
    exhausted: bool,
}

enum EdgeSource {
    Eager { order: Vec<Edge>, cursor: usize },
    Lazy(LazyLoader),
}

struct LocalState {
    verts: AHashMap<VertexId, Vertex>,
    parts: Vec<Partition>,
    edges: AHashSet<Edge>,
    source: EdgeSource,
    ei: u64,
}

/// In-process state backend: the authoritative copy lives in memory, guarded
/// by a single [`RwLock`] (spec §5 — writers lock, readers return clones).
///
/// When `crash_mode` mirrors to a coprocess, every `put_part`/`put_parts`
/// also forwards the delta there; in [`CrashMode::Drill`], reaching
/// `crash_checkpoint` edges pulled wipes in-memory partitions/vertices and
/// rebuilds them from the coprocess's snapshot (spec §4.C).
pub struct LocalBackend {
    state: RwLock<LocalState>,
    crashed: AtomicBool,
    crash_lock: Mutex<()>,
    crash_gate: Condvar,
    k: usize,
    crash_mode: CrashMode,
    crash_checkpoint: u64,
    coprocess: Option<CoprocessBackend>,
    metrics: Arc<dyn MetricsSink>,
}

impl LocalBackend {
    /// Loads the whole dataset up front.
    pub fn eager(
        dataset: impl AsRef<Path>,
        k: usize,
        crash_mode: CrashMode,
        crash_checkpoint: u64,
        coprocess: Option<CoprocessBackend>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        let (edges, verts) = load_edge_file(dataset)?;
        let order: Vec<Edge> = edges.iter().copied().collect();
        Ok(Self {
            state: RwLock::new(LocalState {
                verts,
                parts: vec![Partition::new(); k],
                edges,
                source: EdgeSource::Eager { order, cursor: 0 },
                ei: 0,
            }),
            crashed: AtomicBool::new(false),
            crash_lock: Mutex::new(()),
            crash_gate: Condvar::new(),
            k,
            crash_mode,
            crash_checkpoint,
            coprocess,
            metrics,
        })
    }

    /// Streams the dataset on demand, deduplicating via a Bloom filter with
    /// an exact fallback against the edges seen so far.
    pub fn lazy(
        dataset: impl AsRef<Path>,
        k: usize,
        crash_mode: CrashMode,
        crash_checkpoint: u64,
        coprocess: Option<CoprocessBackend>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        let path = dataset.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        let loader = LazyLoader {
            reader: BufReader::new(file),
            bloom: Bloom::new_for_fp_rate(LAZY_BLOOM_EXPECTED_EDGES, LAZY_BLOOM_FP_RATE),
            path,
            line_no: 0,
            exhausted: false,
        };
        Ok(Self {
            state: RwLock::new(LocalState {
                verts: AHashMap::new(),
                parts: vec![Partition::new(); k],
                edges: AHashSet::new(),
                source: EdgeSource::Lazy(loader),
                ei: 0,
            }),
            crashed: AtomicBool::new(false),
            crash_lock: Mutex::new(()),
            crash_gate: Condvar::new(),
            k,
            crash_mode,
            crash_checkpoint,
            coprocess,
            metrics,
        })
    }

    /// Convenience constructor with no coprocess mirror and a no-op metrics
    /// sink; used throughout tests.
    pub fn eager_without_mirror(dataset: impl AsRef<Path>, k: usize) -> Result<Self> {
        Self::eager(
            dataset,
            k,
            CrashMode::Off,
            edgecut_core::Config::DEFAULT_CRASH_CHECKPOINT,
            None,
            Arc::new(NoopMetricsSink),
        )
    }

    fn run_crash_drill(&self, st: &mut LocalState) {
        let start = Instant::now();
        let before: usize = st.parts.iter().map(Partition::len).sum();

        self.crashed.store(true, Ordering::Release);
        for p in st.parts.iter_mut() {
            *p = Partition::new();
        }
        st.verts.clear();

        if let Some(coprocess) = &self.coprocess {
            match coprocess.get_parts(self.k) {
                Ok(snapshot) => {
                    st.parts = snapshot;
                    for (i, part) in st.parts.iter().enumerate() {
                        for edge in &part.edges {
                            for vtx in edge.endpoints() {
                                let v = st.verts.entry(vtx).or_default();
                                v.deg += 1;
                                v.add_part(i);
                            }
                        }
                    }
                }
                Err(e) => log::error!("crash recovery: coprocess fetch failed: {e}"),
            }
        }

        let after: usize = st.parts.iter().map(Partition::len).sum();
        self.crashed.store(false, Ordering::Release);
        {
            let _guard = self.crash_lock.lock();
            self.crash_gate.notify_all();
        }
        self.metrics
            .record_recovery(start.elapsed().as_millis() as u64, before, after);
    }
}

fn lazy_pull(loader: &mut LazyLoader, edges: &mut AHashSet<Edge>) -> Option<Edge> {
    loop {
        if loader.exhausted {
            return None;
        }
        let mut line = String::new();
        match loader.reader.read_line(&mut line) {
            Ok(0) => {
                loader.exhausted = true;
                return None;
            }
            Ok(_) => {
                loader.line_no += 1;
                match parse_edge_line(&loader.path, loader.line_no, &line) {
                    Ok(Some(edge)) => {
                        if loader.bloom.check(&edge) && edges.contains(&edge) {
                            continue;
                        }
                        loader.bloom.set(&edge);
                        edges.insert(edge);
                        return Some(edge);
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        log::warn!("skipping malformed line in lazy-loaded dataset: {e}");
                        continue;
                    }
                }
            }
            Err(e) => {
                log::error!("lazy dataset read failed: {e}");
                loader.exhausted = true;
                return None;
            }
        }
    }
}

impl StateBackend for LocalBackend {
    fn get_edges(&self) -> AHashSet<Edge> {
        self.state.read().edges.clone()
    }

    fn edges_size(&self) -> usize {
        self.state.read().edges.len()
    }

    fn get_verts(&self) -> AHashMap<VertexId, Vertex> {
        self.state.read().verts.clone()
    }

    fn get_verts_subset(&self, subset: &AHashSet<VertexId>) -> AHashMap<VertexId, Vertex> {
        let st = self.state.read();
        subset
            .iter()
            .filter_map(|id| st.verts.get(id).map(|v| (*id, v.clone())))
            .collect()
    }

    fn get_parts(&self) -> Vec<Partition> {
        self.state.read().parts.clone()
    }

    fn put_verts(&self, delta: AHashMap<VertexId, Vertex>) {
        let mut st = self.state.write();
        for (id, v) in delta {
            st.verts.entry(id).or_default().merge_delta(&v);
        }
    }

    fn put_part(&self, i: PartitionId, delta: &Partition) {
        let mut st = self.state.write();
        st.parts[i].merge(delta);
        if self.crash_mode.mirrors() {
            if let Some(coprocess) = &self.coprocess {
                if let Err(e) = coprocess.put_part(i, delta) {
                    log::warn!("coprocess mirror of partition {i} failed: {e}");
                }
            }
        }
    }

    fn put_parts(&self, delta: &[Partition]) -> Result<()> {
        if delta.len() != self.k {
            return Err(Error::PartitionCountMismatch {
                expected: self.k,
                actual: delta.len(),
            });
        }
        let mut st = self.state.write();
        for (i, d) in delta.iter().enumerate() {
            st.parts[i].merge(d);
        }
        if self.crash_mode.mirrors() {
            if let Some(coprocess) = &self.coprocess {
                if let Err(e) = coprocess.put_parts(delta) {
                    log::warn!("coprocess mirror of partition batch failed: {e}");
                }
            }
        }
        Ok(())
    }

    fn get_edge(&self) -> Option<Edge> {
        let mut st = self.state.write();
        if self.crash_mode == CrashMode::Drill && st.ei == self.crash_checkpoint {
            self.run_crash_drill(&mut st);
        }

        let edge = {
            let LocalState { source, edges, .. } = &mut *st;
            match source {
                EdgeSource::Eager { order, cursor } => {
                    if *cursor >= order.len() {
                        None
                    } else {
                        let e = order[*cursor];
                        *cursor += 1;
                        Some(e)
                    }
                }
                EdgeSource::Lazy(loader) => lazy_pull(loader, edges),
            }
        };

        if edge.is_some() {
            st.ei += 1;
        }
        edge
    }

    fn is_crashed(&self) -> bool {
        self.crashed.load(Ordering::Acquire)
    }

    fn check_crashed(&self) {
        if !self.crashed.load(Ordering::Acquire) {
            return;
        }
        let mut guard = self.crash_lock.lock();
        while self.crashed.load(Ordering::Acquire) {
            self.crash_gate.wait(&mut guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dataset(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        f.flush().unwrap();
        f
    }

    #[test]
    fn eager_hands_out_each_edge_exactly_once() {
        let f = dataset(&["1 2", "2 3", "3 4"]);
        let backend = LocalBackend::eager_without_mirror(f.path(), 2).unwrap();
        let mut seen = AHashSet::new();
        while let Some(e) = backend.get_edge() {
            assert!(seen.insert(e), "edge {e} returned twice");
        }
        assert_eq!(seen.len(), 3);
        assert!(backend.get_edge().is_none());
    }

    #[test]
    fn put_part_and_get_parts_round_trip() {
        let f = dataset(&["1 2"]);
        let backend = LocalBackend::eager_without_mirror(f.path(), 2).unwrap();
        let mut delta = Partition::new();
        delta.add_edge(Edge::new(1, 2));
        backend.put_part(0, &delta);

        let parts = backend.get_parts();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains(&Edge::new(1, 2)));
        assert!(parts[1].is_empty());
    }

    #[test]
    fn put_parts_rejects_wrong_length() {
        let f = dataset(&["1 2"]);
        let backend = LocalBackend::eager_without_mirror(f.path(), 3).unwrap();
        let err = backend.put_parts(&[Partition::new()]).unwrap_err();
        assert!(matches!(
            err,
            Error::PartitionCountMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn put_verts_merges_delta_and_unions_parts() {
        let f = dataset(&["1 2"]);
        let backend = LocalBackend::eager_without_mirror(f.path(), 2).unwrap();

        let mut delta = AHashMap::new();
        let mut dv = Vertex::new();
        dv.delta_deg = 1;
        dv.add_part(0);
        delta.insert(1, dv);
        backend.put_verts(delta);

        let verts = backend.get_verts();
        let v = verts.get(&1).unwrap();
        assert_eq!(v.deg, 1);
        assert!(v.parts.contains(&0));
    }

    #[test]
    fn lazy_mode_dedupes_and_skips_self_loops() {
        let f = dataset(&["1 2", "2 1", "3 3", "2 3"]);
        let backend = LocalBackend::lazy(
            f.path(),
            2,
            CrashMode::Off,
            edgecut_core::Config::DEFAULT_CRASH_CHECKPOINT,
            None,
            Arc::new(NoopMetricsSink),
        )
        .unwrap();

        let mut seen = AHashSet::new();
        while let Some(e) = backend.get_edge() {
            seen.insert(e);
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(backend.edges_size(), 2);
    }

    #[test]
    fn crash_drill_without_coprocess_clears_and_stays_recovered() {
        let f = dataset(&["1 2", "2 3", "3 4"]);
        let backend = LocalBackend::eager(
            f.path(),
            2,
            CrashMode::Drill,
            2,
            None,
            Arc::new(NoopMetricsSink),
        )
        .unwrap();

        backend.get_edge();
        backend.get_edge();
        // Third pull crosses the checkpoint and triggers the drill; with no
        // coprocess mirror attached, partitions/verts simply stay empty.
        backend.get_edge();

        assert!(!backend.is_crashed());
        assert!(backend.get_parts().iter().all(Partition::is_empty));
        assert!(backend.get_verts().is_empty());
    }

    #[test]
    fn put_part_is_idempotent_under_random_repeated_publishes() {
        use rand::Rng;

        let f = dataset(&["1 2"]);
        let backend = LocalBackend::eager_without_mirror(f.path(), 1).unwrap();
        let mut delta = Partition::new();
        delta.add_edge(Edge::new(1, 2));

        let mut rng = rand::thread_rng();
        let republishes = rng.gen_range(1..20);
        for _ in 0..republishes {
            backend.put_part(0, &delta);
        }
        assert_eq!(backend.get_parts()[0].len(), 1);
    }
}
