use std::path::PathBuf;

/// Which heuristic the scorer uses to pick a partition for each edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ScorerKind {
    /// Place where an endpoint already lives; balance as tiebreaker.
    Greedy,
    /// High-Degree Replicated First: biases replication toward high-degree
    /// vertices.
    Hdrf,
    /// Per-partition arithmetic mean of the Greedy and HDRF scores.
    Mixed,
}

impl Default for ScorerKind {
    fn default() -> Self {
        ScorerKind::Hdrf
    }
}

/// Controls whether the state backend mirrors partition writes to a durable
/// coprocess and, if so, whether it also runs the mid-run crash drill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum CrashMode {
    /// No coprocess mirror; the local backend is the only copy of state.
    Off,
    /// Mirror every `put_part`/`put_parts` to the coprocess backend, but
    /// never induce a crash.
    Mirror,
    /// Mirror writes *and* wipe in-memory partition/vertex state once the
    /// edge cursor reaches `crash_checkpoint`, then recover from the
    /// coprocess mirror.
    Drill,
}

impl Default for CrashMode {
    fn default() -> Self {
        CrashMode::Off
    }
}

impl CrashMode {
    pub fn mirrors(self) -> bool {
        !matches!(self, CrashMode::Off)
    }
}

/// Run configuration for a streaming partitioning job.
///
/// Mirrors spec.md §6: `k`, `window`, `subp`, `dataset`, `lazy_load`,
/// `crash_mode`, and the selected scorer. `async_publish`/`async_refresh_every`
/// select between the synchronous and asynchronous write-back Subpartitioner
/// variants described in spec.md §4.D.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "clap", derive(clap::Parser))]
pub struct Config {
    /// Number of output partitions.
    #[cfg_attr(feature = "clap", clap(short = 'k', long, default_value_t = Config::DEFAULT_K))]
    pub k: usize,

    /// Number of edges a worker accumulates before committing a window.
    #[cfg_attr(feature = "clap", clap(long, default_value_t = Config::DEFAULT_WINDOW))]
    pub window: usize,

    /// Number of concurrent Subpartitioner worker threads.
    #[cfg_attr(feature = "clap", clap(long, default_value_t = Config::default_subp()))]
    pub subp: usize,

    /// Path to the whitespace-separated edge list.
    #[cfg_attr(feature = "clap", clap(long))]
    pub dataset: PathBuf,

    /// Stream edges from disk on demand (duplicate-checked via Bloom filter)
    /// instead of reading the whole file up front.
    #[cfg_attr(feature = "clap", clap(long))]
    pub lazy_load: bool,

    /// Which heuristic scorer to use.
    #[cfg_attr(feature = "clap", clap(long, value_enum, default_value_t = ScorerKind::default()))]
    pub scorer: ScorerKind,

    /// Crash-simulation mode.
    #[cfg_attr(feature = "clap", clap(long, value_enum, default_value_t = CrashMode::default()))]
    pub crash_mode: CrashMode,

    /// Edge-cursor checkpoint at which `CrashMode::Drill` wipes and recovers
    /// in-memory state.
    #[cfg_attr(feature = "clap", clap(long, default_value_t = Config::DEFAULT_CRASH_CHECKPOINT))]
    pub crash_checkpoint: u64,

    /// Use the asynchronous write-back Subpartitioner variant.
    #[cfg_attr(feature = "clap", clap(long))]
    pub async_publish: bool,

    /// In the async variant, how many windows a worker places between
    /// refreshing its `parts` snapshot.
    #[cfg_attr(feature = "clap", clap(long, default_value_t = Config::DEFAULT_ASYNC_REFRESH))]
    pub async_refresh_every: usize,
}

impl Config {
    pub const DEFAULT_K: usize = 4;
    pub const DEFAULT_WINDOW: usize = 1000;
    pub const DEFAULT_CRASH_CHECKPOINT: u64 = 2000;
    pub const DEFAULT_ASYNC_REFRESH: usize = 5;

    pub fn default_subp() -> usize {
        num_cpus::get().max(1)
    }

    pub fn new(dataset: PathBuf, k: usize) -> Self {
        Self {
            k,
            window: Self::DEFAULT_WINDOW,
            subp: Self::default_subp(),
            dataset,
            lazy_load: false,
            scorer: ScorerKind::default(),
            crash_mode: CrashMode::default(),
            crash_checkpoint: Self::DEFAULT_CRASH_CHECKPOINT,
            async_publish: false,
            async_refresh_every: Self::DEFAULT_ASYNC_REFRESH,
        }
    }
}
