use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::Result;

/// One window-commit event, reported by a Subpartitioner after it publishes
/// a batch. Mirrors the per-window line the original `DebugStruct` wrote to
/// its log file.
#[derive(Debug, Clone, Copy)]
pub struct WindowEvent {
    pub window_size: usize,
    pub elapsed_ms: u64,
    /// Total edges observed across all partitions at the time of this
    /// commit (a running, possibly over-counted total — see
    /// `total_edges_seen_in_partitions` in spec §6).
    pub partitions_total: usize,
}

/// Receives debug/telemetry events emitted during a run. The default
/// no-op sink costs nothing; attach [`FileMetricsSink`] to get the
/// per-window and cumulative counters described in spec §6.
pub trait MetricsSink: Send + Sync {
    fn record_window(&self, _event: WindowEvent) {}
    fn record_recovery(&self, _elapsed_ms: u64, _edges_before: usize, _edges_after: usize) {}
}

/// Drops every event. Used when no debug sink is attached.
#[derive(Debug, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {}

/// Accumulates the cumulative counters from spec §6
/// (`total_edges_seen_in_partitions`, `useful_edges`, min/max window time)
/// and optionally mirrors each event to a line-oriented log file.
#[derive(Debug)]
pub struct FileMetricsSink {
    total_e: AtomicU64,
    useful_e: AtomicU64,
    max_t: AtomicI64,
    min_t: AtomicI64,
    sink: Mutex<BufWriter<File>>,
}

impl FileMetricsSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref()).map_err(|source| crate::Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Ok(Self {
            total_e: AtomicU64::new(0),
            useful_e: AtomicU64::new(0),
            max_t: AtomicI64::new(i64::MIN),
            min_t: AtomicI64::new(i64::MAX),
            sink: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn total_edges_seen_in_partitions(&self) -> u64 {
        self.total_e.load(Ordering::Relaxed)
    }

    pub fn useful_edges(&self) -> u64 {
        self.useful_e.load(Ordering::Relaxed)
    }

    pub fn max_window_ms(&self) -> i64 {
        self.max_t.load(Ordering::Relaxed)
    }

    pub fn min_window_ms(&self) -> i64 {
        self.min_t.load(Ordering::Relaxed)
    }
}

fn update_max(cell: &AtomicI64, value: i64) {
    let mut prev = cell.load(Ordering::Relaxed);
    while prev < value {
        match cell.compare_exchange_weak(prev, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => prev = actual,
        }
    }
}

fn update_min(cell: &AtomicI64, value: i64) {
    let mut prev = cell.load(Ordering::Relaxed);
    while prev > value {
        match cell.compare_exchange_weak(prev, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => prev = actual,
        }
    }
}

impl MetricsSink for FileMetricsSink {
    fn record_window(&self, event: WindowEvent) {
        self.total_e
            .fetch_add(event.partitions_total as u64, Ordering::Relaxed);
        self.useful_e
            .fetch_add(event.window_size as u64, Ordering::Relaxed);
        update_max(&self.max_t, event.elapsed_ms as i64);
        update_min(&self.min_t, event.elapsed_ms as i64);

        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(
                sink,
                "{} {} {}",
                event.partitions_total, event.window_size, event.elapsed_ms
            );
        }
    }

    fn record_recovery(&self, elapsed_ms: u64, edges_before: usize, edges_after: usize) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(
                sink,
                "recover elapsed_ms={elapsed_ms} edges_before={edges_before} edges_after={edges_after}"
            );
        }
    }
}
