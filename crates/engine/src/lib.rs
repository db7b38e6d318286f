//! The heuristic scorer, Subpartitioner worker loops, and the Major
//! Partitioner that drives them (spec §4.C–§4.E).

pub mod major;
pub mod scorer;
pub mod worker;

pub use major::{Assessment, MajorPartitioner};
pub use scorer::{select_partition, ScoreContext};
pub use worker::{publisher_loop, run_async, run_sync};
