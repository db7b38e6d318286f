use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the partitioner's core, state backend, and engine
/// crates. Backend-transport failures (remote KV, coprocess) are folded into
/// [`Error::Backend`] since the wire protocol itself is out of scope (see
/// spec §6) — callers may retry a backend error because every merge is
/// idempotent.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read edge list from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed edge at {path}:{line}: {text:?}")]
    MalformedEdge {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("scorer selected no partition for edge ({0}, {1})")]
    NoPartitionSelected(crate::edge::VertexId, crate::edge::VertexId),

    #[error("expected {expected} partitions in delta, got {actual}")]
    PartitionCountMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
