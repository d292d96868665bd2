//! Cluster membership state and its audit trail.
//!
//! This crate owns the mutable half of the placement engine:
//! - [`KvStore`] — the durable key-value backing store abstraction
//! - [`NodeRegistry`] — node lifecycle (activate/deactivate), stats refresh,
//!   snapshots, explicit load-or-seed initialization
//! - [`OperationLog`] — bounded, newest-first audit trail of membership and
//!   profile-affecting events
//!
//! All in-memory critical sections are synchronous and release their lock
//! before the durable write is awaited; a toggle racing a stats refresh
//! serializes on the node-table mutex, and the log serializes separately
//! on its own.

pub mod error;
pub mod oplog;
pub mod registry;
pub mod store;

pub use error::RegistryError;
pub use oplog::{LogEntry, OperationKind, OperationLog, LOG_CAPACITY};
pub use registry::{MessageRef, NodeRegistry, ToggleOutcome, NODES_STORE_KEY};
pub use store::{get_typed, set_typed, KvStore, MemoryStore, StoreError};

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
