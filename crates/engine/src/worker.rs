//! The Subpartitioner worker loop (spec §4.D): accumulate a window of edges,
//! snapshot state, score and place locally, publish the delta back.

use std::time::{Duration, Instant};

use ahash::{AHashMap, AHashSet};
use edgecut_state::StateBackend;

use edgecut_core::{Edge, MetricsSink, Partition, PartitionId, Result, ScorerKind, Vertex, VertexId, WindowEvent};

use crate::scorer::{select_partition, ScoreContext};

/// Scores and places every edge in `buf` against the snapshot `verts`,
/// mutating both `verts` and `sizes` as it goes so that later edges in the
/// same window see earlier placements — both the endpoints' updated
/// partition membership and the partitions' updated edge counts (spec:
/// "within one worker, placements occur in the order edges arrive ... within
/// a window").
fn place_window(
    scorer: ScorerKind,
    buf: &[Edge],
    mut verts: AHashMap<VertexId, Vertex>,
    sizes: &mut [usize],
) -> Result<(AHashMap<VertexId, Vertex>, Vec<(PartitionId, Edge)>)> {
    let mut placements = Vec::with_capacity(buf.len());

    for &e in buf {
        verts.entry(e.u).or_default().delta_deg += 1;
        verts.entry(e.v).or_default().delta_deg += 1;

        let (du, u_parts) = {
            let uv = &verts[&e.u];
            (uv.deg + uv.delta_deg, uv.parts.clone())
        };
        let (dv, v_parts) = {
            let vv = &verts[&e.v];
            (vv.deg + vv.delta_deg, vv.parts.clone())
        };

        let ctx = ScoreContext {
            u: e.u,
            v: e.v,
            du,
            dv,
            sizes: &*sizes,
            u_parts: &u_parts,
            v_parts: &v_parts,
        };
        let p = select_partition(scorer, &ctx)?;
        sizes[p] += 1;

        verts.get_mut(&e.u).unwrap().add_part(p);
        verts.get_mut(&e.v).unwrap().add_part(p);
        placements.push((p, e));
    }

    Ok((verts, placements))
}

fn commit_sync(
    backend: &dyn StateBackend,
    scorer: ScorerKind,
    buf: &[Edge],
    vs: &AHashSet<VertexId>,
    metrics: &dyn MetricsSink,
) -> Result<()> {
    let start = Instant::now();
    let verts = backend.get_verts_subset(vs);
    let parts = backend.get_parts();
    let mut sizes: Vec<usize> = parts.iter().map(Partition::len).collect();

    let (verts, placements) = place_window(scorer, buf, verts, &mut sizes)?;

    let mut part_deltas = vec![Partition::new(); parts.len()];
    for (p, e) in placements {
        part_deltas[p].add_edge(e);
    }
    let placed_this_window: usize = part_deltas.iter().map(Partition::len).sum();

    backend.put_verts(verts);
    backend.put_parts(&part_deltas)?;

    metrics.record_window(WindowEvent {
        window_size: buf.len(),
        elapsed_ms: start.elapsed().as_millis() as u64,
        partitions_total: placed_this_window,
    });
    Ok(())
}

/// Runs the synchronous Subpartitioner loop to completion: pulls edges until
/// the backend's edge source is exhausted, committing every `window` edges.
pub fn run_sync(
    backend: &dyn StateBackend,
    scorer: ScorerKind,
    window: usize,
    metrics: &dyn MetricsSink,
) -> Result<()> {
    let mut buf = Vec::with_capacity(window);
    let mut vs = AHashSet::new();

    loop {
        backend.check_crashed();
        match backend.get_edge() {
            Some(e) => {
                buf.push(e);
                vs.insert(e.u);
                vs.insert(e.v);
                if buf.len() >= window {
                    commit_sync(backend, scorer, &buf, &vs, metrics)?;
                    buf.clear();
                    vs.clear();
                }
            }
            None => break,
        }
    }
    if !buf.is_empty() {
        commit_sync(backend, scorer, &buf, &vs, metrics)?;
    }
    Ok(())
}

fn commit_async(
    backend: &dyn StateBackend,
    scorer: ScorerKind,
    buf: &[Edge],
    vs: &AHashSet<VertexId>,
    sizes: &mut [usize],
    tx: &crossbeam_channel::Sender<(PartitionId, Edge)>,
    metrics: &dyn MetricsSink,
) -> Result<()> {
    let start = Instant::now();
    let verts = backend.get_verts_subset(vs);
    let (verts, placements) = place_window(scorer, buf, verts, sizes)?;
    backend.put_verts(verts);

    let placed_this_window = placements.len();
    for (p, e) in placements {
        // The publisher reconciles the backend; a dropped send here would
        // only ever lose throughput, not correctness, since re-placement is
        // idempotent. crossbeam's unbounded sender never actually fails
        // while the receiver is alive, which holds for the lifetime of run().
        let _ = tx.send((p, e));
    }

    metrics.record_window(WindowEvent {
        window_size: buf.len(),
        elapsed_ms: start.elapsed().as_millis() as u64,
        partitions_total: placed_this_window,
    });
    Ok(())
}

/// Runs the asynchronous Subpartitioner loop: places edges inline and
/// publishes vertex deltas inline, but only enqueues `(partition, edge)`
/// placements for the paired [`publisher_loop`] to merge. The partition
/// sizes used for balance scoring are refreshed every `refresh_every`
/// windows rather than on every commit.
pub fn run_async(
    backend: &dyn StateBackend,
    scorer: ScorerKind,
    window: usize,
    refresh_every: usize,
    tx: crossbeam_channel::Sender<(PartitionId, Edge)>,
    metrics: &dyn MetricsSink,
) -> Result<()> {
    let mut buf = Vec::with_capacity(window);
    let mut vs = AHashSet::new();
    let mut sizes: Vec<usize> = backend.get_parts().iter().map(Partition::len).collect();
    let mut windows_since_refresh = 0usize;

    loop {
        backend.check_crashed();
        match backend.get_edge() {
            Some(e) => {
                buf.push(e);
                vs.insert(e.u);
                vs.insert(e.v);
                if buf.len() >= window {
                    commit_async(backend, scorer, &buf, &vs, &mut sizes, &tx, metrics)?;
                    buf.clear();
                    vs.clear();
                    windows_since_refresh += 1;
                    if windows_since_refresh >= refresh_every.max(1) {
                        sizes = backend.get_parts().iter().map(Partition::len).collect();
                        windows_since_refresh = 0;
                    }
                }
            }
            None => break,
        }
    }
    if !buf.is_empty() {
        commit_async(backend, scorer, &buf, &vs, &mut sizes, &tx, metrics)?;
    }
    Ok(())
}

fn drain_available(
    rx: &crossbeam_channel::Receiver<(PartitionId, Edge)>,
    k: usize,
) -> Option<Vec<Partition>> {
    let mut delta = vec![Partition::new(); k];
    let mut got_any = false;
    while let Ok((p, e)) = rx.try_recv() {
        delta[p].add_edge(e);
        got_any = true;
    }
    got_any.then_some(delta)
}

/// The publisher half of the async variant: drains `rx` into a length-`k`
/// partition delta and merges it into `backend`, looping until `stop` is
/// set. Performs one guaranteed final drain after observing `stop` so a
/// placement enqueued between the last check and the flag being set is
/// never lost (spec §9: "must also drain one last time after stop").
pub fn publisher_loop(
    backend: &dyn StateBackend,
    rx: &crossbeam_channel::Receiver<(PartitionId, Edge)>,
    stop: &std::sync::atomic::AtomicBool,
    k: usize,
) {
    use std::sync::atomic::Ordering;

    loop {
        let stopping = stop.load(Ordering::Acquire);
        if let Some(delta) = drain_available(rx, k) {
            if let Err(e) = backend.put_parts(&delta) {
                log::warn!("publisher: put_parts failed: {e}");
            }
        }
        if stopping {
            break;
        }
        let _ = rx.recv_timeout(Duration::from_millis(5));
    }

    if let Some(delta) = drain_available(rx, k) {
        if let Err(e) = backend.put_parts(&delta) {
            log::warn!("publisher: final drain put_parts failed: {e}");
        }
    }
}
