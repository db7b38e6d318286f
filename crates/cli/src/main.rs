//! Command-line entry point: parses a run [`Config`], builds the configured
//! state backend, drives a [`MajorPartitioner`] to completion, and reports
//! the two scalar quality metrics from spec §6 (plus any anomalies).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

use edgecut_core::{Config, FileMetricsSink, MetricsSink, NoopMetricsSink};
use edgecut_engine::MajorPartitioner;
use edgecut_state::{CoprocessBackend, LocalBackend, StateBackend};

/// Extra flags the run needs that aren't part of the shared [`Config`]
/// record (spec §6 scopes the coprocess's *wire protocol* in, but not how a
/// caller launches one).
#[derive(Debug, Parser)]
#[clap(author, version, about = "Streaming edge-cut graph partitioner")]
struct Args {
    #[clap(flatten)]
    config: Config,

    /// Command used to launch a coprocess mirror, e.g. `--coprocess-cmd
    /// "./mirror-server --port 9000"`. Required when `--crash-mode` is
    /// `mirror` or `drill`.
    #[clap(long)]
    coprocess_cmd: Option<String>,

    /// Write per-window and cumulative debug counters to this file.
    #[clap(long)]
    debug_log: Option<PathBuf>,

    /// Emit the final metrics as a JSON object on stdout instead of plain
    /// text.
    #[clap(long)]
    json: bool,
}

fn spawn_coprocess(cmd_line: &str) -> edgecut_core::Result<CoprocessBackend> {
    let mut parts = cmd_line.split_whitespace();
    let cmd = parts.next().ok_or_else(|| {
        edgecut_core::Error::Backend("--coprocess-cmd is empty".to_string())
    })?;
    let args: Vec<&str> = parts.collect();
    CoprocessBackend::spawn(cmd, &args)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = args.config;

    info!(
        "starting run: k={} window={} subp={} scorer={:?} crash_mode={:?} dataset={:?}",
        config.k, config.window, config.subp, config.scorer, config.crash_mode, config.dataset
    );

    let metrics: Arc<dyn MetricsSink> = match &args.debug_log {
        Some(path) => Arc::new(FileMetricsSink::create(path)?),
        None => Arc::new(NoopMetricsSink),
    };

    let coprocess = match (config.crash_mode.mirrors(), &args.coprocess_cmd) {
        (true, Some(cmd_line)) => Some(spawn_coprocess(cmd_line)?),
        (true, None) => {
            return Err("--crash-mode mirror/drill requires --coprocess-cmd".into());
        }
        (false, _) => None,
    };

    let backend: Arc<dyn StateBackend> = if config.lazy_load {
        Arc::new(LocalBackend::lazy(
            &config.dataset,
            config.k,
            config.crash_mode,
            config.crash_checkpoint,
            coprocess,
            Arc::clone(&metrics),
        )?)
    } else {
        Arc::new(LocalBackend::eager(
            &config.dataset,
            config.k,
            config.crash_mode,
            config.crash_checkpoint,
            coprocess,
            Arc::clone(&metrics),
        )?)
    };

    let major = MajorPartitioner::with_metrics(Arc::clone(&backend), &config, metrics);
    major.run();
    major.join()?;

    let assessment = major.assess();
    for anomaly in &assessment.anomalies {
        log::warn!("{anomaly}");
    }

    if args.json {
        let report = serde_json::json!({
            "replicate_factor": assessment.replicate_factor,
            "load_relative_stddev": assessment.load_relative_stddev,
            "anomalies": assessment.anomalies,
        });
        println!("{report}");
    } else {
        println!("replicate_factor: {:.4}", assessment.replicate_factor);
        println!("load_relative_stddev: {:.4}", assessment.load_relative_stddev);
        if !assessment.anomalies.is_empty() {
            println!("anomalies: {}", assessment.anomalies.len());
        }
    }

    Ok(())
}
