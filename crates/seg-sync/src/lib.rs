//! Change detection for remote dictionaries.
//!
//! A [`SyncMonitor`] watches one (domain, dictionary type) endpoint: it reads
//! the object's change token, reloads the domain's dictionary when the token
//! moves, and records the token it adopted under this node's id. A
//! [`Scheduled`] task drives a monitor at a fixed delay on its own thread.

pub mod cluster;
pub mod monitor;
pub mod scheduler;

pub use cluster::{ClusterMembership, StaticCluster};
pub use monitor::{Phase, PollOutcome, RemoteDictionaryState, SyncError, SyncMonitor};
pub use scheduler::Scheduled;
