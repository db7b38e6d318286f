//! Pluggable state backends for the streaming edge-cut partitioner: the
//! [`StateBackend`] trait plus its three implementations.
//!
//! - [`LocalBackend`]: in-process, optionally mirrored to a
//!   [`CoprocessBackend`] for crash recovery.
//! - [`RemoteBackend`]: addressed through a [`KvClient`], using the key
//!   conventions from spec §6.
//! - [`CoprocessBackend`]: a durable partition mirror spoken to over a
//!   line-oriented text protocol; primarily a recovery source for
//!   [`LocalBackend`]'s crash drill rather than a standalone backend.

pub mod backend;
pub mod coprocess;
pub mod local;
pub mod remote;

pub use backend::StateBackend;
pub use coprocess::CoprocessBackend;
pub use local::LocalBackend;
pub use remote::{InMemoryKvClient, KvClient, RemoteBackend};
