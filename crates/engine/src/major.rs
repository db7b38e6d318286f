//! The Major Partitioner (spec §4.E): owns the worker pool (and, in the
//! async variant, the publisher threads), runs the lifecycle, and computes
//! the end-of-run quality metrics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use ahash::AHashMap;
use parking_lot::Mutex;
use rayon::prelude::*;

use edgecut_core::{Config, Edge, Error, MetricsSink, NoopMetricsSink, PartitionId, Result, ScorerKind, Vertex};
use edgecut_state::StateBackend;

use crate::worker::{publisher_loop, run_async, run_sync};

/// The two quality metrics from spec §4.E, plus any non-fatal anomalies
/// `assess` turned up while scanning the final state.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub replicate_factor: f64,
    pub load_relative_stddev: f64,
    pub anomalies: Vec<String>,
}

/// Owns `config.subp` Subpartitioner workers (and, when `config.async_publish`
/// is set, one publisher thread per worker) sharing a single
/// [`StateBackend`]. `run` spawns the threads; `join` waits for them in the
/// order spec §4.E requires (workers first, then publishers); `assess`
/// computes [`Assessment`] from the final backend state.
pub struct MajorPartitioner {
    backend: Arc<dyn StateBackend>,
    k: usize,
    subp: usize,
    window: usize,
    scorer: ScorerKind,
    async_publish: bool,
    async_refresh_every: usize,
    metrics: Arc<dyn MetricsSink>,
    stop: Arc<AtomicBool>,
    worker_handles: Mutex<Vec<JoinHandle<Result<()>>>>,
    publisher_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl MajorPartitioner {
    pub fn new(backend: Arc<dyn StateBackend>, config: &Config) -> Self {
        Self::with_metrics(backend, config, Arc::new(NoopMetricsSink))
    }

    pub fn with_metrics(
        backend: Arc<dyn StateBackend>,
        config: &Config,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            backend,
            k: config.k,
            subp: config.subp.max(1),
            window: config.window.max(1),
            scorer: config.scorer,
            async_publish: config.async_publish,
            async_refresh_every: config.async_refresh_every,
            metrics,
            stop: Arc::new(AtomicBool::new(false)),
            worker_handles: Mutex::new(Vec::new()),
            publisher_handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawns every worker thread (and, in async mode, its paired publisher
    /// thread). Call [`Self::join`] once to wait for completion.
    pub fn run(&self) {
        let mut worker_handles = self.worker_handles.lock();
        let mut publisher_handles = self.publisher_handles.lock();

        for _ in 0..self.subp {
            let backend = Arc::clone(&self.backend);
            let metrics = Arc::clone(&self.metrics);
            let scorer = self.scorer;
            let window = self.window;

            if self.async_publish {
                let (tx, rx) = crossbeam_channel::unbounded::<(PartitionId, Edge)>();
                let refresh_every = self.async_refresh_every;
                let k = self.k;
                let stop = Arc::clone(&self.stop);
                let publisher_backend = Arc::clone(&self.backend);

                worker_handles.push(std::thread::spawn(move || {
                    run_async(backend.as_ref(), scorer, window, refresh_every, tx, metrics.as_ref())
                }));
                publisher_handles.push(std::thread::spawn(move || {
                    publisher_loop(publisher_backend.as_ref(), &rx, stop.as_ref(), k);
                }));
            } else {
                worker_handles.push(std::thread::spawn(move || {
                    run_sync(backend.as_ref(), scorer, window, metrics.as_ref())
                }));
            }
        }
    }

    /// Waits for every worker to finish, then (in async mode) signals `stop`
    /// and waits for every publisher.
    pub fn join(&self) -> Result<()> {
        let handles = std::mem::take(&mut *self.worker_handles.lock());
        for h in handles {
            h.join()
                .map_err(|_| Error::Backend("worker thread panicked".into()))??;
        }

        if self.async_publish {
            self.stop.store(true, Ordering::Release);
            let handles = std::mem::take(&mut *self.publisher_handles.lock());
            for h in handles {
                h.join()
                    .map_err(|_| Error::Backend("publisher thread panicked".into()))?;
            }
        }
        Ok(())
    }

    /// Computes [`Assessment`] from the current backend state. Safe to call
    /// after `join`, or mid-run for a periodic progress read.
    pub fn assess(&self) -> Assessment {
        let verts: AHashMap<_, Vertex> = self.backend.get_verts();
        let parts = self.backend.get_parts();
        let edges = self.backend.get_edges();

        let vertex_values: Vec<&Vertex> = verts.values().collect();
        let total_replication: usize = vertex_values.into_par_iter().map(Vertex::replication).sum();
        let replicate_factor = if verts.is_empty() {
            0.0
        } else {
            total_replication as f64 / verts.len() as f64
        };

        let load_mean = if self.k == 0 {
            0.0
        } else {
            edges.len() as f64 / self.k as f64
        };
        let load_relative_stddev = if self.k <= 1 || load_mean == 0.0 {
            0.0
        } else {
            let sum_sq: f64 = parts
                .iter()
                .map(|p| {
                    let d = p.len() as f64 - load_mean;
                    d * d
                })
                .sum();
            (sum_sq / (self.k as f64 - 1.0)).sqrt() / load_mean
        };

        let mut anomalies = Vec::new();
        let mut first_seen_in: AHashMap<Edge, usize> = AHashMap::new();
        for (i, part) in parts.iter().enumerate() {
            for &e in &part.edges {
                match first_seen_in.get(&e) {
                    Some(&first) => anomalies.push(format!(
                        "duplicate placement: edge {e} is in both partition {first} and partition {i}"
                    )),
                    None => {
                        first_seen_in.insert(e, i);
                    }
                }
            }
        }
        for e in &edges {
            if !first_seen_in.contains_key(e) {
                anomalies.push(format!("missing edge: {e} was never placed in any partition"));
            }
        }
        for a in &anomalies {
            log::warn!("assess: {a}");
        }

        Assessment {
            replicate_factor,
            load_relative_stddev,
            anomalies,
        }
    }
}
