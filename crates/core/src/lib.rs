//! Core data model for streaming edge-cut graph partitioning: the `Edge`,
//! `Vertex`, and `Partition` types, run [`Config`], the shared [`Error`]
//! type, edge-file loading, and the [`metrics`] sink trait used by the
//! state backend and engine crates.

pub mod config;
pub mod edge;
pub mod error;
pub mod load;
pub mod metrics;
pub mod partition;
pub mod vertex;

pub use config::{Config, CrashMode, ScorerKind};
pub use edge::{Edge, PartitionId, VertexId};
pub use error::{Error, Result};
pub use metrics::{FileMetricsSink, MetricsSink, NoopMetricsSink, WindowEvent};
pub use partition::Partition;
pub use vertex::Vertex;

pub mod prelude {
    pub use crate::config::{Config, CrashMode, ScorerKind};
    pub use crate::edge::{Edge, PartitionId, VertexId};
    pub use crate::error::{Error, Result};
    pub use crate::metrics::{FileMetricsSink, MetricsSink, NoopMetricsSink, WindowEvent};
    pub use crate::partition::Partition;
    pub use crate::vertex::Vertex;
}
